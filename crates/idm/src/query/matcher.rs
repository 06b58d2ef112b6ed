// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0
//! In-memory evaluation of query predicates.
//!
//! Stores without a native query language filter with these functions,
//! stores with one push down what they can and post-filter the rest.
use std::cmp::Ordering;

use crate::query::{
    IdentityParameter, IdentityQuery, QueryValue, RelationshipParameter, RelationshipQuery,
    SortField,
};
use crate::types::{AttributeValue, Attributes, IdentityKind, IdentityType, Relationship};

fn in_scope(scope: &[String], partition_id: &str) -> bool {
    scope.is_empty() || scope.iter().any(|x| x == partition_id)
}

fn attribute_matches(attributes: &Attributes, name: &str, expected: &QueryValue) -> bool {
    let QueryValue::Attribute(expected) = expected else {
        return false;
    };
    match attributes.get(name) {
        Some(AttributeValue::List(values)) if !matches!(expected, AttributeValue::List(_)) => {
            values.contains(expected)
        }
        Some(value) => value == expected,
        None => false,
    }
}

fn str_matches(actual: Option<&str>, expected: &QueryValue) -> bool {
    actual.is_some_and(|actual| expected.as_str() == Some(actual))
}

fn user_field<'a>(identity: &'a IdentityType, parameter: &IdentityParameter) -> Option<&'a str> {
    match (&identity.kind, parameter) {
        (IdentityKind::User { first_name, .. }, IdentityParameter::FirstName) => {
            first_name.as_deref()
        }
        (IdentityKind::User { last_name, .. }, IdentityParameter::LastName) => {
            last_name.as_deref()
        }
        (IdentityKind::User { email, .. }, IdentityParameter::Email) => email.as_deref(),
        _ => None,
    }
}

fn parameter_matches(identity: &IdentityType, parameter: &IdentityParameter, value: &QueryValue) -> bool {
    match (parameter, value) {
        (IdentityParameter::Id, val) => str_matches(Some(&identity.id), val),
        (IdentityParameter::Enabled, QueryValue::Boolean(val)) => identity.enabled == *val,
        (IdentityParameter::CreatedAfter, QueryValue::DateTime(val)) => identity.created_at >= *val,
        (IdentityParameter::CreatedBefore, QueryValue::DateTime(val)) => {
            identity.created_at <= *val
        }
        (IdentityParameter::ExpiryAfter, QueryValue::DateTime(val)) => {
            identity.expires_at.is_some_and(|exp| exp >= *val)
        }
        (IdentityParameter::ExpiryBefore, QueryValue::DateTime(val)) => {
            identity.expires_at.is_some_and(|exp| exp <= *val)
        }
        (IdentityParameter::LoginName, val) => str_matches(identity.login_name(), val),
        (
            param @ (IdentityParameter::FirstName
            | IdentityParameter::LastName
            | IdentityParameter::Email),
            val,
        ) => str_matches(user_field(identity, param), val),
        (IdentityParameter::Name, val) => str_matches(identity.name(), val),
        (IdentityParameter::Path, val) => str_matches(identity.group_path(), val),
        (IdentityParameter::Parent, val) => identity
            .group_parent_id()
            .is_some_and(|parent| val.identity_id() == Some(parent)),
        (IdentityParameter::Attribute(name), val) => {
            attribute_matches(&identity.attributes, name, val)
        }
        // Resolved into id constraints before reaching a store.
        (param, _) if param.is_relational() => true,
        _ => false,
    }
}

/// Whether the identity satisfies the predicates of the query.
///
/// Sorting and pagination are not considered.
pub fn identity_matches(query: &IdentityQuery, identity: &IdentityType) -> bool {
    in_scope(query.scope(), &identity.partition_id)
        && query.filter().matches(&identity.kind)
        && query
            .id_constraint()
            .is_none_or(|ids| ids.contains(&identity.id))
        && query.parameters().iter().all(|(param, values)| {
            values.iter().any(|val| parameter_matches(identity, param, val))
        })
}

fn compare_identities(field: SortField, a: &IdentityType, b: &IdentityType) -> Ordering {
    match field {
        SortField::Id => a.id.cmp(&b.id),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
        SortField::Key => a
            .kind
            .natural_key()
            .cmp(&b.kind.natural_key())
            .then(a.id.cmp(&b.id)),
    }
}

/// Sort and paginate the matching identities.
pub fn order_identities(query: &IdentityQuery, mut identities: Vec<IdentityType>) -> Vec<IdentityType> {
    let (field, ascending) = query.sort().unwrap_or((SortField::Id, true));
    identities.sort_by(|a, b| {
        let ord = compare_identities(field, a, b);
        if ascending { ord } else { ord.reverse() }
    });
    paginate(identities, query.offset(), query.limit())
}

/// Filter, sort and paginate the identities.
pub fn select_identities<'a, I>(query: &IdentityQuery, identities: I) -> Vec<IdentityType>
where
    I: IntoIterator<Item = &'a IdentityType>,
{
    let matching = identities
        .into_iter()
        .filter(|identity| identity_matches(query, identity))
        .cloned()
        .collect();
    order_identities(query, matching)
}

pub(crate) fn paginate<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    items
        .into_iter()
        .skip(offset)
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

fn relationship_parameter_matches(
    relationship: &Relationship,
    parameter: &RelationshipParameter,
    value: &QueryValue,
) -> bool {
    match parameter {
        RelationshipParameter::Id => value.as_str() == Some(relationship.id.as_str()),
        RelationshipParameter::Identity => value
            .identity_id()
            .is_some_and(|id| relationship.references(id)),
        RelationshipParameter::Slot(slot) => {
            relationship.identity(slot).is_some() && relationship.identity(slot) == value.identity_id()
        }
        RelationshipParameter::Attribute(name) => {
            attribute_matches(&relationship.attributes, name, value)
        }
    }
}

/// Whether the relationship satisfies the predicates of the query.
pub fn relationship_matches(query: &RelationshipQuery, relationship: &Relationship) -> bool {
    in_scope(query.scope(), &relationship.partition_id)
        && query.kind().is_none_or(|kind| kind == &relationship.kind)
        && query.parameters().iter().all(|(param, values)| {
            values
                .iter()
                .any(|val| relationship_parameter_matches(relationship, param, val))
        })
}

/// Filter and paginate the relationships, ordered by id.
pub fn select_relationships<'a, I>(query: &RelationshipQuery, relationships: I) -> Vec<Relationship>
where
    I: IntoIterator<Item = &'a Relationship>,
{
    let mut matching: Vec<Relationship> = relationships
        .into_iter()
        .filter(|rel| relationship_matches(query, rel))
        .cloned()
        .collect();
    matching.sort_by(|a, b| a.id.cmp(&b.id));
    paginate(matching, query.offset(), query.limit())
}
