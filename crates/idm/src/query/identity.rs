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

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::IdentityManagementError;
use crate::types::{AttributeValue, IdentityKind, IdentityType, IdentityTypeFilter};

/// Query parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum QueryValue {
    String(String),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    Identity(Box<IdentityType>),
    Attribute(AttributeValue),
}

impl QueryValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(val) => Some(val),
            _ => None,
        }
    }

    /// Identity id of an identity value or a plain string id.
    pub fn identity_id(&self) -> Option<&str> {
        match self {
            Self::Identity(identity) => Some(&identity.id),
            Self::String(val) => Some(val),
            _ => None,
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(val) => write!(f, "{val}"),
            Self::Boolean(val) => write!(f, "{val}"),
            Self::DateTime(val) => write!(f, "{}", val.to_rfc3339()),
            Self::Identity(identity) => write!(f, "{identity}"),
            Self::Attribute(val) => write!(f, "{val}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<DateTime<Utc>> for QueryValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl From<&IdentityType> for QueryValue {
    fn from(value: &IdentityType) -> Self {
        Self::Identity(Box::new(value.clone()))
    }
}

impl From<IdentityType> for QueryValue {
    fn from(value: IdentityType) -> Self {
        Self::Identity(Box::new(value))
    }
}

impl From<AttributeValue> for QueryValue {
    fn from(value: AttributeValue) -> Self {
        Self::Attribute(value)
    }
}

/// Identity query parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityParameter {
    Id,
    Enabled,
    CreatedAfter,
    CreatedBefore,
    ExpiryAfter,
    ExpiryBefore,
    LoginName,
    FirstName,
    LastName,
    Email,
    /// Group or role name.
    Name,
    /// Group path.
    Path,
    /// Parent group.
    Parent,
    Attribute(String),
    /// Identities granted the role.
    HasRole,
    /// Roles granted to the identity.
    RoleOf,
    /// Identities member of the group.
    MemberOf,
    /// Groups having the member.
    HasMember,
}

impl IdentityParameter {
    /// Parameter resolved through relationships.
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Self::HasRole | Self::RoleOf | Self::MemberOf | Self::HasMember
        )
    }

    fn applies_to(&self, filter: &IdentityTypeFilter) -> bool {
        use IdentityTypeFilter as F;
        match self {
            Self::LoginName => matches!(filter, F::Any | F::Agent | F::User),
            Self::FirstName | Self::LastName | Self::Email => matches!(filter, F::Any | F::User),
            Self::Name => matches!(filter, F::Any | F::Group | F::Role),
            Self::Path | Self::Parent | Self::HasMember => matches!(filter, F::Any | F::Group),
            Self::RoleOf => matches!(filter, F::Any | F::Role),
            Self::HasRole | Self::MemberOf => !matches!(filter, F::Role),
            _ => true,
        }
    }

    /// Check the value type, normalizing it where possible.
    fn check_value(&self, value: QueryValue) -> Result<QueryValue, QueryValue> {
        match (self, value) {
            (
                Self::Id
                | Self::LoginName
                | Self::FirstName
                | Self::LastName
                | Self::Email
                | Self::Name
                | Self::Path,
                val @ QueryValue::String(_),
            ) => Ok(val),
            (Self::Enabled, val @ QueryValue::Boolean(_)) => Ok(val),
            (
                Self::CreatedAfter | Self::CreatedBefore | Self::ExpiryAfter | Self::ExpiryBefore,
                val @ QueryValue::DateTime(_),
            ) => Ok(val),
            (Self::Attribute(_), val @ QueryValue::Attribute(_)) => Ok(val),
            (Self::Attribute(_), QueryValue::String(val)) => {
                Ok(QueryValue::Attribute(AttributeValue::String(val)))
            }
            (Self::Attribute(_), QueryValue::Boolean(val)) => {
                Ok(QueryValue::Attribute(AttributeValue::Boolean(val)))
            }
            (Self::Parent | Self::MemberOf, val @ QueryValue::Identity(_)) => {
                match &val {
                    QueryValue::Identity(identity) if identity.is_group() => Ok(val),
                    _ => Err(val),
                }
            }
            (Self::HasRole, val @ QueryValue::Identity(_)) => match &val {
                QueryValue::Identity(identity) if identity.is_role() => Ok(val),
                _ => Err(val),
            },
            (Self::RoleOf, val @ QueryValue::Identity(_)) => match &val {
                QueryValue::Identity(identity) if !identity.is_role() => Ok(val),
                _ => Err(val),
            },
            (Self::HasMember, val @ QueryValue::Identity(_)) => match &val {
                QueryValue::Identity(identity)
                    if identity.kind.is_agent()
                        || matches!(identity.kind, IdentityKind::Group { .. }) =>
                {
                    Ok(val)
                }
                _ => Err(val),
            },
            (Self::Parent, val @ QueryValue::String(_)) => Ok(val),
            (_, val) => Err(val),
        }
    }
}

impl fmt::Display for IdentityParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => write!(f, "attribute.{name}"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

/// Sort field of the identity query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Id,
    CreatedAt,
    /// Natural key (login name, group path or role name).
    Key,
}

/// Identity query.
///
/// Values of one parameter are alternatives, different parameters must all
/// match. The relational parameters must match all their values.
#[derive(Clone, Debug, Default)]
pub struct IdentityQuery {
    filter: IdentityTypeFilter,
    parameters: BTreeMap<IdentityParameter, Vec<QueryValue>>,
    scope: Vec<String>,
    id_constraint: Option<BTreeSet<String>>,
    sort: Option<(SortField, bool)>,
    offset: usize,
    limit: Option<usize>,
}

impl IdentityQuery {
    pub fn new(filter: IdentityTypeFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Set the parameter values replacing the previous ones.
    pub fn set_parameter<I, V>(
        &mut self,
        parameter: IdentityParameter,
        values: I,
    ) -> Result<&mut Self, IdentityManagementError>
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryValue>,
    {
        if !parameter.applies_to(&self.filter) {
            return Err(IdentityManagementError::UnsupportedQueryParameter {
                parameter: parameter.to_string(),
                query_type: self.filter.name().to_string(),
            });
        }
        let mut checked = Vec::new();
        for value in values {
            checked.push(parameter.check_value(value.into()).map_err(|val| {
                IdentityManagementError::UnsupportedQueryParameterValue {
                    parameter: parameter.to_string(),
                    value: val.to_string(),
                }
            })?);
        }
        if checked.is_empty() {
            return Err(IdentityManagementError::NullArgument(parameter.to_string()));
        }
        self.parameters.insert(parameter, checked);
        Ok(self)
    }

    /// Owned variant of [`set_parameter`](Self::set_parameter) with a single
    /// value.
    pub fn with_parameter<V: Into<QueryValue>>(
        mut self,
        parameter: IdentityParameter,
        value: V,
    ) -> Result<Self, IdentityManagementError> {
        self.set_parameter(parameter, [value])?;
        Ok(self)
    }

    pub fn sort_by(mut self, field: SortField, ascending: bool) -> Self {
        self.sort = Some((field, ascending));
        self
    }

    pub fn paginate(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Restrict the query to the partitions.
    pub(crate) fn in_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = scope;
        self
    }

    pub(crate) fn set_scope(&mut self, scope: Vec<String>) {
        self.scope = scope;
    }

    /// Restrict the result to the ids, intersecting with previous
    /// restrictions.
    pub(crate) fn constrain_ids(&mut self, ids: BTreeSet<String>) {
        self.id_constraint = Some(match self.id_constraint.take() {
            Some(existing) => existing.intersection(&ids).cloned().collect(),
            None => ids,
        });
    }

    pub fn filter(&self) -> &IdentityTypeFilter {
        &self.filter
    }

    pub fn parameters(&self) -> &BTreeMap<IdentityParameter, Vec<QueryValue>> {
        &self.parameters
    }

    pub fn parameter(&self, parameter: &IdentityParameter) -> Option<&[QueryValue]> {
        self.parameters.get(parameter).map(Vec::as_slice)
    }

    /// Partitions the query is restricted to. Empty means unrestricted.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub fn id_constraint(&self) -> Option<&BTreeSet<String>> {
        self.id_constraint.as_ref()
    }

    pub fn sort(&self) -> Option<(SortField, bool)> {
        self.sort
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Remove and return the relational parameters.
    pub(crate) fn take_relational(&mut self) -> Vec<(IdentityParameter, Vec<QueryValue>)> {
        let relational: Vec<IdentityParameter> = self
            .parameters
            .keys()
            .filter(|param| param.is_relational())
            .cloned()
            .collect();
        relational
            .into_iter()
            .filter_map(|param| self.parameters.remove_entry(&param))
            .collect()
    }

    /// Copy of the query without pagination.
    pub(crate) fn without_pagination(&self) -> Self {
        let mut query = self.clone();
        query.offset = 0;
        query.limit = None;
        query
    }
}
