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
//! Resolution of the relational identity query parameters.
//!
//! `HasRole`, `RoleOf`, `MemberOf` and `HasMember` can not be evaluated on
//! the identity records alone. The engine turns every value of these
//! parameters into the set of matching identity ids using relationship
//! queries and restricts the identity query to their intersection. Stores
//! therefore only ever see plain predicates.
use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::trace;

use crate::error::IdentityManagementError;
use crate::query::{
    IdentityParameter, IdentityQuery, QueryValue, RelationshipParameter, RelationshipQuery,
};
use crate::types::{
    ASSIGNEE, GROUP, IdentityType, IdentityTypeFilter, MEMBER, ROLE, Relationship,
    RelationshipKind,
};

/// Data the relational parameters are resolved against.
#[async_trait]
pub trait QuerySource: Send + Sync {
    /// All relationships matching the query in the visible partitions.
    async fn find_relationships(
        &self,
        query: RelationshipQuery,
    ) -> Result<Vec<Relationship>, IdentityManagementError>;

    /// All groups of the visible partitions.
    async fn find_groups(&self) -> Result<Vec<IdentityType>, IdentityManagementError>;
}

/// Whether `path` is the group path `ancestor` or one of its descendants.
pub fn is_path_within(path: &str, ancestor: &str) -> bool {
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn slot_ids<'a>(relationships: &'a [Relationship], slot: &'a str) -> impl Iterator<Item = String> + 'a {
    relationships
        .iter()
        .filter_map(move |rel| rel.identity(slot).map(str::to_string))
}

fn value_id(
    parameter: &IdentityParameter,
    value: &QueryValue,
) -> Result<String, IdentityManagementError> {
    value
        .identity_id()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IdentityManagementError::UnsupportedQueryParameterValue {
            parameter: parameter.to_string(),
            value: value.to_string(),
        })
}

async fn relationships_with(
    source: &dyn QuerySource,
    kind: RelationshipKind,
    slot: &str,
    ids: Vec<String>,
) -> Result<Vec<Relationship>, IdentityManagementError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = RelationshipQuery::new(kind);
    query.set_parameter(RelationshipParameter::Slot(slot.to_string()), ids)?;
    source.find_relationships(query).await
}

/// Path of the group given as the parameter value, looked up among the
/// visible groups when the value carries no path.
fn group_path<'a>(value: &'a QueryValue, groups: &'a [IdentityType], id: &str) -> Option<&'a str> {
    if let QueryValue::Identity(identity) = value
        && let Some(path) = identity.group_path()
        && !path.is_empty()
    {
        return Some(path);
    }
    groups
        .iter()
        .find(|group| group.id == id)
        .and_then(IdentityType::group_path)
}

/// Ids matching a single value of a relational parameter.
async fn resolve_value(
    source: &dyn QuerySource,
    parameter: &IdentityParameter,
    value: &QueryValue,
) -> Result<BTreeSet<String>, IdentityManagementError> {
    let id = value_id(parameter, value)?;
    let ids = match parameter {
        IdentityParameter::HasRole => {
            let grants = relationships_with(source, RelationshipKind::Grant, ROLE, vec![id]).await?;
            slot_ids(&grants, ASSIGNEE).collect()
        }
        IdentityParameter::RoleOf => {
            let grants =
                relationships_with(source, RelationshipKind::Grant, ASSIGNEE, vec![id]).await?;
            slot_ids(&grants, ROLE).collect()
        }
        IdentityParameter::MemberOf => {
            // Members of subgroups are members of the group as well.
            let groups = source.find_groups().await?;
            let group_ids: Vec<String> = match group_path(value, &groups, &id) {
                Some(path) => groups
                    .iter()
                    .filter(|g| g.group_path().is_some_and(|p| is_path_within(p, path)))
                    .map(|g| g.id.clone())
                    .collect(),
                None => vec![id],
            };
            let memberships =
                relationships_with(source, RelationshipKind::GroupMembership, GROUP, group_ids)
                    .await?;
            slot_ids(&memberships, MEMBER).collect()
        }
        IdentityParameter::HasMember => {
            let memberships =
                relationships_with(source, RelationshipKind::GroupMembership, MEMBER, vec![id])
                    .await?;
            let direct: BTreeSet<String> = slot_ids(&memberships, GROUP).collect();
            if direct.is_empty() {
                return Ok(direct);
            }
            // The member also belongs to every ancestor of its groups.
            let groups = source.find_groups().await?;
            let paths: Vec<&str> = groups
                .iter()
                .filter(|g| direct.contains(&g.id))
                .filter_map(IdentityType::group_path)
                .collect();
            groups
                .iter()
                .filter(|g| {
                    g.group_path()
                        .is_some_and(|ancestor| paths.iter().any(|p| is_path_within(p, ancestor)))
                })
                .map(|g| g.id.clone())
                .chain(direct.iter().cloned())
                .collect()
        }
        _ => {
            return Err(IdentityManagementError::UnsupportedQueryParameter {
                parameter: parameter.to_string(),
                query_type: IdentityTypeFilter::Any.name().to_string(),
            });
        }
    };
    Ok(ids)
}

/// Replace the relational parameters of the query by id constraints.
///
/// Every value of a relational parameter must match, so the id sets of all
/// values are intersected.
pub async fn resolve_relational(
    source: &dyn QuerySource,
    query: &mut IdentityQuery,
) -> Result<(), IdentityManagementError> {
    for (parameter, values) in query.take_relational() {
        for value in &values {
            let ids = resolve_value(source, &parameter, value).await?;
            trace!("{parameter} resolved to {} identities", ids.len());
            query.constrain_ids(ids);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::query::matcher;

    #[derive(Default)]
    struct Fixture {
        groups: Vec<IdentityType>,
        relationships: Vec<Relationship>,
        queries: Mutex<usize>,
    }

    #[async_trait]
    impl QuerySource for Fixture {
        async fn find_relationships(
            &self,
            query: RelationshipQuery,
        ) -> Result<Vec<Relationship>, IdentityManagementError> {
            *self.queries.lock().unwrap() += 1;
            Ok(matcher::select_relationships(&query, &self.relationships))
        }

        async fn find_groups(&self) -> Result<Vec<IdentityType>, IdentityManagementError> {
            Ok(self.groups.clone())
        }
    }

    fn stored(id: &str, mut identity: IdentityType) -> IdentityType {
        identity.id = id.into();
        identity.partition_id = "p".into();
        identity
    }

    fn group(id: &str, path: &str) -> IdentityType {
        let name = path.rsplit('/').next().unwrap_or_default();
        let mut group = stored(id, IdentityType::group(name));
        if let crate::types::IdentityKind::Group { path: p, .. } = &mut group.kind {
            *p = path.into();
        }
        group
    }

    fn relationship(id: &str, rel: Relationship) -> Relationship {
        let mut rel = rel;
        rel.id = id.into();
        rel.partition_id = "p".into();
        rel
    }

    fn fixture() -> (Fixture, IdentityType, IdentityType, IdentityType, IdentityType, IdentityType) {
        let john = stored("john", IdentityType::user("john"));
        let mary = stored("mary", IdentityType::user("mary"));
        let admin = stored("admin", IdentityType::role("admin"));
        let staff = group("staff", "/staff");
        let devs = group("devs", "/staff/devs");
        let fixture = Fixture {
            groups: vec![staff.clone(), devs.clone(), group("staffing", "/staffing")],
            relationships: vec![
                relationship("g1", Relationship::grant(&john, &admin)),
                relationship("g2", Relationship::grant(&staff, &admin)),
                relationship("m1", Relationship::group_membership(&mary, &devs)),
                relationship("m2", Relationship::group_membership(&john, &staff)),
            ],
            queries: Mutex::new(0),
        };
        (fixture, john, mary, admin, staff, devs)
    }

    #[test]
    fn test_path_within() {
        assert!(is_path_within("/a", "/a"));
        assert!(is_path_within("/a/b", "/a"));
        assert!(!is_path_within("/ab", "/a"));
        assert!(!is_path_within("/a", "/a/b"));
    }

    #[tokio::test]
    async fn test_has_role() {
        let (fixture, _, _, admin, _, _) = fixture();
        let mut query = IdentityQuery::new(IdentityTypeFilter::Any)
            .with_parameter(IdentityParameter::HasRole, &admin)
            .unwrap();
        resolve_relational(&fixture, &mut query).await.unwrap();
        assert!(query.parameter(&IdentityParameter::HasRole).is_none());
        assert_eq!(
            Some(&BTreeSet::from(["john".to_string(), "staff".to_string()])),
            query.id_constraint()
        );
    }

    #[tokio::test]
    async fn test_role_of() {
        let (fixture, john, mary, _, _, _) = fixture();
        let mut query = IdentityQuery::new(IdentityTypeFilter::Role)
            .with_parameter(IdentityParameter::RoleOf, &john)
            .unwrap();
        resolve_relational(&fixture, &mut query).await.unwrap();
        assert_eq!(
            Some(&BTreeSet::from(["admin".to_string()])),
            query.id_constraint()
        );

        let mut query = IdentityQuery::new(IdentityTypeFilter::Role)
            .with_parameter(IdentityParameter::RoleOf, &mary)
            .unwrap();
        resolve_relational(&fixture, &mut query).await.unwrap();
        assert_eq!(Some(&BTreeSet::new()), query.id_constraint());
    }

    #[tokio::test]
    async fn test_member_of_includes_subgroups() {
        let (fixture, _, _, _, staff, devs) = fixture();
        let mut query = IdentityQuery::new(IdentityTypeFilter::Agent)
            .with_parameter(IdentityParameter::MemberOf, &staff)
            .unwrap();
        resolve_relational(&fixture, &mut query).await.unwrap();
        assert_eq!(
            Some(&BTreeSet::from(["john".to_string(), "mary".to_string()])),
            query.id_constraint()
        );

        let mut query = IdentityQuery::new(IdentityTypeFilter::Agent)
            .with_parameter(IdentityParameter::MemberOf, &devs)
            .unwrap();
        resolve_relational(&fixture, &mut query).await.unwrap();
        assert_eq!(
            Some(&BTreeSet::from(["mary".to_string()])),
            query.id_constraint()
        );
    }

    #[tokio::test]
    async fn test_has_member_includes_ancestors() {
        let (fixture, _, mary, _, _, _) = fixture();
        let mut query = IdentityQuery::new(IdentityTypeFilter::Group)
            .with_parameter(IdentityParameter::HasMember, &mary)
            .unwrap();
        resolve_relational(&fixture, &mut query).await.unwrap();
        assert_eq!(
            Some(&BTreeSet::from(["devs".to_string(), "staff".to_string()])),
            query.id_constraint()
        );
    }

    #[tokio::test]
    async fn test_all_values_must_match() {
        let (fixture, john, mary, _, staff, devs) = fixture();
        let mut query = IdentityQuery::new(IdentityTypeFilter::Agent);
        query
            .set_parameter(IdentityParameter::MemberOf, [&staff, &devs])
            .unwrap();
        resolve_relational(&fixture, &mut query).await.unwrap();
        let ids = query.id_constraint().unwrap();
        assert!(ids.contains(&mary.id));
        assert!(!ids.contains(&john.id));
    }

    #[tokio::test]
    async fn test_plain_query_untouched() {
        let (fixture, _, _, _, _, _) = fixture();
        let mut query = IdentityQuery::new(IdentityTypeFilter::User)
            .with_parameter(IdentityParameter::LoginName, "john")
            .unwrap();
        resolve_relational(&fixture, &mut query).await.unwrap();
        assert!(query.id_constraint().is_none());
        assert_eq!(0, *fixture.queries.lock().unwrap());
    }

    #[tokio::test]
    async fn test_unsaved_identity_rejected() {
        let (fixture, _, _, _, _, _) = fixture();
        let mut query = IdentityQuery::new(IdentityTypeFilter::Any)
            .with_parameter(IdentityParameter::HasRole, IdentityType::role("new"))
            .unwrap();
        assert!(matches!(
            resolve_relational(&fixture, &mut query).await,
            Err(IdentityManagementError::UnsupportedQueryParameterValue { .. })
        ));
    }
}
