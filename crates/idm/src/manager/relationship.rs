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
//! Relationship management and the role and group helpers.
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::IdentityManagementError;
use crate::feature::FeatureOperation;
use crate::manager::IdentityManager;
use crate::manager::registry::ConfiguredStore;
use crate::query::engine::is_path_within;
use crate::query::matcher::paginate;
use crate::query::{RelationshipParameter, RelationshipQuery};
use crate::store::InvocationContext;
use crate::types::{
    ASSIGNEE, GROUP, IdentityType, IdentityTypeFilter, MEMBER, ROLE, Relationship,
    RelationshipKind, check_slot,
};

impl IdentityManager {
    fn relationship_not_found(&self, id: &str) -> IdentityManagementError {
        IdentityManagementError::RelationshipNotFound {
            id: id.to_string(),
            partition: self.partition.name.clone(),
        }
    }

    /// Stored relationship of this partition served by the entry.
    async fn owned_relationship(
        &self,
        ctx: &InvocationContext,
        entry: &ConfiguredStore,
        id: &str,
    ) -> Result<Relationship, IdentityManagementError> {
        let store = entry
            .store
            .relationship_store()
            .ok_or_else(|| self.relationship_not_found(id))?;
        store
            .get_relationship(ctx, id)
            .await?
            .filter(|rel| rel.partition_id == self.partition.id)
            .ok_or_else(|| self.relationship_not_found(id))
    }

    /// Check that every slot references a visible identity of a kind the
    /// slot accepts.
    async fn check_relationship(&self, relationship: &Relationship) -> Result<(), IdentityManagementError> {
        let invalid = |reason: String| IdentityManagementError::InvalidRelationship {
            type_name: relationship.kind.to_string(),
            reason,
        };
        for slot in relationship.kind.slots() {
            if relationship.identity(slot).is_none() {
                return Err(invalid(format!("missing {slot}")));
            }
        }
        if relationship.identities.is_empty() {
            return Err(invalid("no identity referenced".into()));
        }
        for (slot, id) in &relationship.identities {
            let identity = self
                .lookup_identity_by_id(IdentityTypeFilter::Any, id)
                .await?
                .ok_or_else(|| self.not_found(id))?;
            check_slot(&relationship.kind, slot, &identity.kind).map_err(invalid)?;
        }
        Ok(())
    }

    /// Store a new relationship in the partition.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn add_relationship(
        &self,
        relationship: Relationship,
    ) -> Result<Relationship, IdentityManagementError> {
        let entry = self.runtime.registry.relationship_store(
            self.configuration(),
            &relationship.kind,
            FeatureOperation::Create,
        )?;
        self.check_relationship(&relationship).await?;
        let mut relationship = relationship;
        relationship.partition_id = self.partition.id.clone();
        let store = entry.store.relationship_store().ok_or_else(|| {
            IdentityManagementError::UnsupportedRelationshipType {
                type_name: relationship.kind.to_string(),
                operation: FeatureOperation::Create,
            }
        })?;
        store.add_relationship(&self.context(), relationship).await
    }

    /// Replace the attributes of a relationship of the partition.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn update_relationship(
        &self,
        relationship: Relationship,
    ) -> Result<Relationship, IdentityManagementError> {
        let entry = self.runtime.registry.relationship_store(
            self.configuration(),
            &relationship.kind,
            FeatureOperation::Update,
        )?;
        let ctx = self.context();
        let mut current = self.owned_relationship(&ctx, entry, &relationship.id).await?;
        current.attributes = relationship.attributes;
        match entry.store.relationship_store() {
            Some(store) => store.update_relationship(&ctx, current).await,
            None => Err(self.relationship_not_found(&relationship.id)),
        }
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn remove_relationship(
        &self,
        relationship: &Relationship,
    ) -> Result<(), IdentityManagementError> {
        let entry = self.runtime.registry.relationship_store(
            self.configuration(),
            &relationship.kind,
            FeatureOperation::Delete,
        )?;
        let ctx = self.context();
        let current = self.owned_relationship(&ctx, entry, &relationship.id).await?;
        match entry.store.relationship_store() {
            Some(store) => store.remove_relationship(&ctx, &current).await,
            None => Err(self.relationship_not_found(&relationship.id)),
        }
    }

    /// Visible relationships matching the query, merged over the stores and
    /// ordered by id. The pagination of the query is ignored.
    pub(super) async fn collect_relationships(
        &self,
        query: RelationshipQuery,
    ) -> Result<Vec<Relationship>, IdentityManagementError> {
        let query = query.in_scope(self.scope.clone());
        let mut stores = self.runtime.registry.relationship_stores(self.configuration())?;
        if let Some(kind) = query.kind() {
            stores.retain(|entry| entry.supports_relationship(kind, FeatureOperation::Read));
            if stores.is_empty() {
                return Err(IdentityManagementError::UnsupportedRelationshipType {
                    type_name: kind.to_string(),
                    operation: FeatureOperation::Read,
                });
            }
        }
        let ctx = self.context();
        let mut merged: BTreeMap<String, Relationship> = BTreeMap::new();
        for entry in stores {
            if let Some(store) = entry.store.relationship_store() {
                for rel in store.query_relationships(&ctx, &query).await? {
                    merged.entry(rel.id.clone()).or_insert(rel);
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Visible relationships matching the query, ordered by id and
    /// paginated.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn query_relationships(
        &self,
        query: RelationshipQuery,
    ) -> Result<Vec<Relationship>, IdentityManagementError> {
        let (offset, limit) = (query.offset(), query.limit());
        let all = self.collect_relationships(query.paginate(0, None)).await?;
        Ok(paginate(all, offset, limit))
    }

    async fn find(
        &self,
        kind: RelationshipKind,
        slots: &[(&str, &IdentityType)],
    ) -> Result<Vec<Relationship>, IdentityManagementError> {
        let mut query = RelationshipQuery::new(kind);
        for (slot, identity) in slots {
            query.set_parameter(
                RelationshipParameter::Slot(slot.to_string()),
                [identity.id.as_str()],
            )?;
        }
        self.collect_relationships(query).await
    }

    async fn remove_all(&self, relationships: Vec<Relationship>) -> Result<(), IdentityManagementError> {
        for rel in relationships {
            // Relationships of ancestor tiers are not ours to remove.
            if rel.partition_id == self.partition.id {
                self.remove_relationship(&rel).await?;
            }
        }
        Ok(())
    }

    /// Path of the group, looked up when the value carries none.
    async fn resolve_group_path(
        &self,
        group: &IdentityType,
    ) -> Result<Option<String>, IdentityManagementError> {
        if let Some(path) = group.group_path().filter(|path| !path.is_empty()) {
            return Ok(Some(path.to_string()));
        }
        Ok(self
            .lookup_identity_by_id(IdentityTypeFilter::Group, &group.id)
            .await?
            .and_then(|g| g.group_path().map(str::to_string)))
    }

    /// Grant the role to the assignee unless already granted.
    #[tracing::instrument(level = "info", skip_all, fields(assignee = %assignee, role = %role))]
    pub async fn grant_role(
        &self,
        assignee: &IdentityType,
        role: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        if self.has_role(assignee, role).await? {
            debug!("role already granted");
            return Ok(());
        }
        self.add_relationship(Relationship::grant(assignee, role))
            .await
            .map(|_| ())
    }

    #[tracing::instrument(level = "info", skip_all, fields(assignee = %assignee, role = %role))]
    pub async fn revoke_role(
        &self,
        assignee: &IdentityType,
        role: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        let grants = self
            .find(RelationshipKind::Grant, &[(ASSIGNEE, assignee), (ROLE, role)])
            .await?;
        self.remove_all(grants).await
    }

    /// Whether the role is granted directly to the assignee.
    #[tracing::instrument(level = "info", skip_all, fields(assignee = %assignee, role = %role))]
    pub async fn has_role(
        &self,
        assignee: &IdentityType,
        role: &IdentityType,
    ) -> Result<bool, IdentityManagementError> {
        Ok(!self
            .find(RelationshipKind::Grant, &[(ASSIGNEE, assignee), (ROLE, role)])
            .await?
            .is_empty())
    }

    /// Add the member to the group unless it is a member already.
    #[tracing::instrument(level = "info", skip_all, fields(member = %member, group = %group))]
    pub async fn add_to_group(
        &self,
        member: &IdentityType,
        group: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        if !self
            .find(
                RelationshipKind::GroupMembership,
                &[(MEMBER, member), (GROUP, group)],
            )
            .await?
            .is_empty()
        {
            return Ok(());
        }
        self.add_relationship(Relationship::group_membership(member, group))
            .await
            .map(|_| ())
    }

    #[tracing::instrument(level = "info", skip_all, fields(member = %member, group = %group))]
    pub async fn remove_from_group(
        &self,
        member: &IdentityType,
        group: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        let memberships = self
            .find(
                RelationshipKind::GroupMembership,
                &[(MEMBER, member), (GROUP, group)],
            )
            .await?;
        self.remove_all(memberships).await
    }

    /// Whether the identity is a member of the group or of one of its
    /// subgroups.
    #[tracing::instrument(level = "info", skip_all, fields(member = %member, group = %group))]
    pub async fn is_member(
        &self,
        member: &IdentityType,
        group: &IdentityType,
    ) -> Result<bool, IdentityManagementError> {
        let memberships = self
            .find(RelationshipKind::GroupMembership, &[(MEMBER, member)])
            .await?;
        if memberships
            .iter()
            .any(|rel| rel.identity(GROUP) == Some(group.id.as_str()))
        {
            return Ok(true);
        }
        let Some(path) = self.resolve_group_path(group).await? else {
            return Ok(false);
        };
        for rel in &memberships {
            let Some(group_id) = rel.identity(GROUP) else {
                continue;
            };
            if let Some(member_of) = self
                .lookup_identity_by_id(IdentityTypeFilter::Group, group_id)
                .await?
                && member_of
                    .group_path()
                    .is_some_and(|member_path| is_path_within(member_path, &path))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Grant the role in the group to the assignee unless already granted.
    #[tracing::instrument(level = "info", skip_all, fields(assignee = %assignee, group = %group, role = %role))]
    pub async fn grant_group_role(
        &self,
        assignee: &IdentityType,
        group: &IdentityType,
        role: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        let existing = self
            .find(
                RelationshipKind::GroupRole,
                &[(ASSIGNEE, assignee), (GROUP, group), (ROLE, role)],
            )
            .await?;
        if !existing.is_empty() {
            return Ok(());
        }
        self.add_relationship(Relationship::group_role(assignee, group, role))
            .await
            .map(|_| ())
    }

    #[tracing::instrument(level = "info", skip_all, fields(assignee = %assignee, group = %group, role = %role))]
    pub async fn revoke_group_role(
        &self,
        assignee: &IdentityType,
        group: &IdentityType,
        role: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        let existing = self
            .find(
                RelationshipKind::GroupRole,
                &[(ASSIGNEE, assignee), (GROUP, group), (ROLE, role)],
            )
            .await?;
        self.remove_all(existing).await
    }

    /// Whether the assignee holds the role in the group. A role held in a
    /// group applies to all of its subgroups.
    #[tracing::instrument(level = "info", skip_all, fields(assignee = %assignee, group = %group, role = %role))]
    pub async fn has_group_role(
        &self,
        assignee: &IdentityType,
        group: &IdentityType,
        role: &IdentityType,
    ) -> Result<bool, IdentityManagementError> {
        let group_roles = self
            .find(
                RelationshipKind::GroupRole,
                &[(ASSIGNEE, assignee), (ROLE, role)],
            )
            .await?;
        if group_roles
            .iter()
            .any(|rel| rel.identity(GROUP) == Some(group.id.as_str()))
        {
            return Ok(true);
        }
        let Some(path) = self.resolve_group_path(group).await? else {
            return Ok(false);
        };
        for rel in &group_roles {
            let Some(group_id) = rel.identity(GROUP) else {
                continue;
            };
            if let Some(granted_in) = self
                .lookup_identity_by_id(IdentityTypeFilter::Group, group_id)
                .await?
                && granted_in
                    .group_path()
                    .is_some_and(|granted_path| is_path_within(&path, granted_path))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::credential::CredentialHandlerRegistry;
    use crate::manager::{IdentityConfigurationBuilder, PartitionManager, StoreConfiguration};
    use crate::store::{DefaultContextFactory, FileStoreConfiguration};

    async fn manager() -> IdentityManager {
        let config = IdentityConfigurationBuilder::new()
            .named(
                "default",
                [StoreConfiguration::file(FileStoreConfiguration::default())],
            )
            .build()
            .unwrap();
        let pm = PartitionManager::new();
        pm.bootstrap(
            config,
            Arc::new(DefaultContextFactory::new(CredentialHandlerRegistry::new())),
        )
        .await
        .unwrap();
        pm.create_identity_manager().await.unwrap()
    }

    #[tokio::test]
    async fn test_grant_and_revoke_role() {
        let sot = manager().await;
        let john = sot.add(IdentityType::user("john")).await.unwrap();
        let admin = sot.add(IdentityType::role("admin")).await.unwrap();
        assert!(!sot.has_role(&john, &admin).await.unwrap());
        sot.grant_role(&john, &admin).await.unwrap();
        sot.grant_role(&john, &admin).await.unwrap();
        assert!(sot.has_role(&john, &admin).await.unwrap());
        assert_eq!(
            1,
            sot.query_relationships(RelationshipQuery::new(RelationshipKind::Grant))
                .await
                .unwrap()
                .len()
        );
        sot.revoke_role(&john, &admin).await.unwrap();
        assert!(!sot.has_role(&john, &admin).await.unwrap());
    }

    #[tokio::test]
    async fn test_membership_of_subgroup() {
        let sot = manager().await;
        let john = sot.add(IdentityType::user("john")).await.unwrap();
        let org = sot.add(IdentityType::group("org")).await.unwrap();
        let it = sot
            .add(IdentityType::group_with_parent("it", &org))
            .await
            .unwrap();
        sot.add_to_group(&john, &it).await.unwrap();
        assert!(sot.is_member(&john, &it).await.unwrap());
        assert!(sot.is_member(&john, &org).await.unwrap());
        sot.remove_from_group(&john, &it).await.unwrap();
        assert!(!sot.is_member(&john, &org).await.unwrap());
    }

    #[tokio::test]
    async fn test_group_role_applies_to_subgroups() {
        let sot = manager().await;
        let john = sot.add(IdentityType::user("john")).await.unwrap();
        let manager = sot.add(IdentityType::role("manager")).await.unwrap();
        let org = sot.add(IdentityType::group("org")).await.unwrap();
        let it = sot
            .add(IdentityType::group_with_parent("it", &org))
            .await
            .unwrap();
        sot.grant_group_role(&john, &org, &manager).await.unwrap();
        assert!(sot.has_group_role(&john, &org, &manager).await.unwrap());
        assert!(sot.has_group_role(&john, &it, &manager).await.unwrap());
        sot.revoke_group_role(&john, &org, &manager).await.unwrap();
        assert!(!sot.has_group_role(&john, &it, &manager).await.unwrap());

        sot.grant_group_role(&john, &it, &manager).await.unwrap();
        assert!(!sot.has_group_role(&john, &org, &manager).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_relationships() {
        let sot = manager().await;
        let john = sot.add(IdentityType::user("john")).await.unwrap();
        let admin = sot.add(IdentityType::role("admin")).await.unwrap();
        assert!(matches!(
            sot.add_relationship(Relationship::grant(&admin, &admin)).await,
            Err(IdentityManagementError::InvalidRelationship { .. })
        ));
        assert!(matches!(
            sot.add_relationship(Relationship::new(RelationshipKind::Grant).with_identity(ROLE, &admin))
                .await,
            Err(IdentityManagementError::InvalidRelationship { .. })
        ));
        let ghost = IdentityType::role("ghost");
        assert!(sot
            .add_relationship(Relationship::grant(&john, &ghost))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_custom_relationship_attributes() {
        let sot = manager().await;
        let john = sot.add(IdentityType::user("john")).await.unwrap();
        let device = sot.add(IdentityType::custom("device")).await.unwrap();
        let owner = sot
            .add_relationship(
                Relationship::new(RelationshipKind::Custom("ownership".into()))
                    .with_identity("owner", &john)
                    .with_identity("device", &device)
                    .with_attribute("since", "2020"),
            )
            .await
            .unwrap();
        let mut changed = owner.clone().with_attribute("since", "2021");
        changed.identities.clear();
        let updated = sot.update_relationship(changed).await.unwrap();
        assert_eq!(owner.identities, updated.identities);

        let query = RelationshipQuery::new(RelationshipKind::Custom("ownership".into()))
            .with_parameter(RelationshipParameter::Slot("owner".into()), &john)
            .unwrap();
        assert_eq!(vec![updated.clone()], sot.query_relationships(query).await.unwrap());

        sot.remove(&john).await.unwrap();
        assert!(sot
            .query_relationships(RelationshipQuery::any())
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            sot.remove_relationship(&updated).await,
            Err(IdentityManagementError::RelationshipNotFound { .. })
        ));
    }
}
