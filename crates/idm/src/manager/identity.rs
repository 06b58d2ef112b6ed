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
//! Identity type management within a partition.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};
use validator::Validate;

use crate::error::IdentityManagementError;
use crate::feature::FeatureOperation;
use crate::manager::Runtime;
use crate::manager::registry::ConfiguredStore;
use crate::query::engine::{QuerySource, resolve_relational};
use crate::query::matcher::order_identities;
use crate::query::{IdentityParameter, IdentityQuery, RelationshipQuery};
use crate::store::{InvocationContext, REFERENCE_TIME};
use crate::types::{IdentityKind, IdentityType, IdentityTypeFilter, Partition, Relationship};

/// Manages the identity types, relationships and credentials of a single
/// partition.
///
/// Reads see the partitions of the scope (the partition itself and, for a
/// tier, its ancestor tiers). Mutations are restricted to the partition.
#[derive(Clone)]
pub struct IdentityManager {
    pub(super) runtime: Arc<Runtime>,
    pub(super) partition: Partition,
    pub(super) scope: Vec<String>,
    pub(super) reference_time: Option<DateTime<Utc>>,
}

impl fmt::Debug for IdentityManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityManager")
            .field("partition", &self.partition.name)
            .field("scope", &self.scope)
            .finish()
    }
}

impl IdentityManager {
    pub(crate) fn new(runtime: Arc<Runtime>, partition: Partition, scope: Vec<String>) -> Self {
        Self {
            runtime,
            partition,
            scope,
            reference_time: None,
        }
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Ids of the visible partitions, nearest first.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Evaluate expirations against the given time instead of the clock.
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub(super) fn context(&self) -> InvocationContext {
        let ctx = self
            .runtime
            .context_factory
            .create_context(&self.partition, self.scope.clone());
        match self.reference_time {
            Some(now) => ctx.with_parameter(REFERENCE_TIME, now),
            None => ctx,
        }
    }

    pub(super) fn configuration(&self) -> &str {
        &self.partition.configuration_name
    }

    pub(super) fn not_found(&self, id: &str) -> IdentityManagementError {
        IdentityManagementError::IdentityTypeNotFound {
            id: id.to_string(),
            partition: self.partition.name.clone(),
        }
    }

    /// Position of the partition in the scope, `None` when invisible.
    fn scope_rank(&self, partition_id: &str) -> Option<usize> {
        self.scope.iter().position(|id| id == partition_id)
    }

    /// Stored identity of this partition served by the entry.
    async fn owned_identity(
        &self,
        ctx: &InvocationContext,
        entry: &ConfiguredStore,
        id: &str,
    ) -> Result<IdentityType, IdentityManagementError> {
        entry
            .store
            .get_identity(ctx, id)
            .await?
            .filter(|identity| identity.partition_id == self.partition.id)
            .ok_or_else(|| self.not_found(id))
    }

    /// Fail when another identity of the partition holds the natural key of
    /// the identity.
    async fn ensure_unique(
        &self,
        ctx: &InvocationContext,
        identity: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        let (filter, parameter) = match &identity.kind {
            IdentityKind::Agent { .. } | IdentityKind::User { .. } => {
                (IdentityTypeFilter::Agent, IdentityParameter::LoginName)
            }
            IdentityKind::Group { .. } => (IdentityTypeFilter::Group, IdentityParameter::Path),
            IdentityKind::Role { .. } => (IdentityTypeFilter::Role, IdentityParameter::Name),
            IdentityKind::Custom { .. } => return Ok(()),
        };
        let Some(key) = identity.kind.natural_key() else {
            return Ok(());
        };
        let Ok(stores) =
            self.runtime
                .registry
                .identity_stores(self.configuration(), &filter, FeatureOperation::Read)
        else {
            return Ok(());
        };
        let query = IdentityQuery::new(filter)
            .with_parameter(parameter, key)?
            .in_scope(vec![self.partition.id.clone()]);
        for entry in stores {
            let existing = entry.store.query_identities(ctx, &query).await?;
            if existing.iter().any(|other| other.id != identity.id) {
                return Err(IdentityManagementError::IdentityTypeAlreadyExists {
                    type_name: identity.type_name().to_string(),
                    key: key.to_string(),
                    partition: self.partition.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Compute the path of a group from its visible parent.
    async fn assign_group_path(
        &self,
        identity: &mut IdentityType,
    ) -> Result<(), IdentityManagementError> {
        let IdentityKind::Group {
            name, parent_id, ..
        } = &identity.kind
        else {
            return Ok(());
        };
        let path = match parent_id {
            Some(parent_id) => {
                let parent = self
                    .lookup_identity_by_id(IdentityTypeFilter::Group, parent_id)
                    .await?
                    .ok_or_else(|| IdentityManagementError::GroupParentNotFound {
                        id: parent_id.clone(),
                        partition: self.partition.name.clone(),
                    })?;
                format!("{}/{name}", parent.group_path().unwrap_or_default())
            }
            None => format!("/{name}"),
        };
        if let IdentityKind::Group { path: current, .. } = &mut identity.kind {
            *current = path;
        }
        Ok(())
    }

    /// Store a new identity type in the partition.
    ///
    /// The natural key (login name, group path, role name) must be unique in
    /// the partition. A group parent must be visible from the partition.
    #[tracing::instrument(level = "info", skip(self, identity), fields(identity = %identity))]
    pub async fn add(&self, identity: IdentityType) -> Result<IdentityType, IdentityManagementError> {
        identity.validate_kind()?;
        identity.validate()?;
        let entry = self.runtime.registry.identity_store(
            self.configuration(),
            &identity.kind,
            FeatureOperation::Create,
        )?;
        let mut identity = identity;
        identity.partition_id = self.partition.id.clone();
        self.assign_group_path(&mut identity).await?;

        let ctx = self.context();
        self.ensure_unique(&ctx, &identity).await?;
        entry.store.add_identity(&ctx, identity).await
    }

    /// Update an identity type of the partition.
    ///
    /// The creation date and the name, parent and path of a group can not be
    /// changed.
    #[tracing::instrument(level = "info", skip(self, identity), fields(identity = %identity))]
    pub async fn update(
        &self,
        identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        identity.validate_kind()?;
        identity.validate()?;
        let entry = self.runtime.registry.identity_store(
            self.configuration(),
            &identity.kind,
            FeatureOperation::Update,
        )?;
        let ctx = self.context();
        let current = self.owned_identity(&ctx, entry, &identity.id).await?;
        if current.type_name() != identity.type_name() {
            return Err(IdentityManagementError::InvalidArgument(format!(
                "{} {} can not become a {}",
                current.type_name(),
                current.id,
                identity.type_name()
            )));
        }
        let mut updated = identity;
        updated.partition_id = current.partition_id.clone();
        updated.created_at = current.created_at;
        if current.is_group() {
            updated.kind = current.kind.clone();
        }
        if updated.kind.natural_key() != current.kind.natural_key() {
            self.ensure_unique(&ctx, &updated).await?;
        }
        entry.store.update_identity(&ctx, updated).await
    }

    /// Remove an identity type of the partition together with every
    /// relationship referencing it and its credentials.
    ///
    /// Nothing is removed when the store owning the identity fails. When the
    /// relationships or credentials live in other stores, they are removed
    /// after the identity.
    #[tracing::instrument(level = "info", skip(self, identity), fields(identity = %identity))]
    pub async fn remove(&self, identity: &IdentityType) -> Result<(), IdentityManagementError> {
        let registry = &self.runtime.registry;
        let entry = registry.identity_store(
            self.configuration(),
            &identity.kind,
            FeatureOperation::Delete,
        )?;
        let ctx = self.context();
        let current = self.owned_identity(&ctx, entry, &identity.id).await?;
        if current.is_group() {
            let query = IdentityQuery::new(IdentityTypeFilter::Group)
                .with_parameter(IdentityParameter::Parent, current.id.as_str())?;
            if self.count(query).await? > 0 {
                return Err(IdentityManagementError::InvalidArgument(format!(
                    "group {} still has subgroups",
                    current.group_path().unwrap_or_default()
                )));
            }
        }

        // The owning store removes the identity and the references it holds
        // in one step. The cleanup of the other stores is best effort: when
        // it fails the identity is already gone and only dangling references
        // remain.
        entry.store.remove_identity(&ctx, &current).await?;
        for other in registry.relationship_stores(self.configuration())? {
            if other.same_as(entry) {
                continue;
            }
            if let Some(relationships) = other.store.relationship_store() {
                let removed = relationships
                    .remove_relationships_for_identity(&ctx, &current.id)
                    .await?;
                debug!("removed {removed} relationship(s) of {}", current.id);
            }
        }
        if let Ok(other) = registry.credential_store(self.configuration(), FeatureOperation::Update)
            && !other.same_as(entry)
            && let Some(credentials) = other.store.credential_store()
        {
            credentials.remove_credentials(&ctx, &current.id).await?;
        }
        Ok(())
    }

    /// Visible identity type with the id, restricted to the filter.
    ///
    /// Fails with [`IdentityManagementError::AmbiguousIdentityType`] when
    /// more than one store knows the id.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn lookup_identity_by_id(
        &self,
        filter: IdentityTypeFilter,
        id: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        let ctx = self.context();
        if let Some(cache) = ctx.cache() {
            for partition_id in &self.scope {
                if let Some(identity) = cache.lookup(partition_id, id)
                    && filter.matches(&identity.kind)
                {
                    trace!("identity {id} served from the cache");
                    return Ok(Some(identity));
                }
            }
        }
        let stores =
            self.runtime
                .registry
                .identity_stores(self.configuration(), &filter, FeatureOperation::Read)?;
        let mut found: Vec<IdentityType> = Vec::new();
        for entry in stores {
            if let Some(identity) = entry.store.get_identity(&ctx, id).await?
                && filter.matches(&identity.kind)
                && self.scope_rank(&identity.partition_id).is_some()
            {
                found.push(identity);
            }
        }
        if found.len() > 1 {
            return Err(IdentityManagementError::AmbiguousIdentityType(id.to_string()));
        }
        let identity = found.pop();
        if let (Some(cache), Some(identity)) = (ctx.cache(), &identity) {
            cache.put(identity);
        }
        Ok(identity)
    }

    /// Nearest visible identity matching the query.
    async fn find_nearest(
        &self,
        query: IdentityQuery,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        Ok(self
            .query(query)
            .await?
            .into_iter()
            .min_by_key(|identity| self.scope_rank(&identity.partition_id)))
    }

    /// Agent (or user) with the login name.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn get_agent(
        &self,
        login_name: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        self.find_nearest(
            IdentityQuery::new(IdentityTypeFilter::Agent)
                .with_parameter(IdentityParameter::LoginName, login_name)?,
        )
        .await
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn get_user(
        &self,
        login_name: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        self.find_nearest(
            IdentityQuery::new(IdentityTypeFilter::User)
                .with_parameter(IdentityParameter::LoginName, login_name)?,
        )
        .await
    }

    /// Group by its path. A bare name is the path of a root group.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn get_group(&self, path: &str) -> Result<Option<IdentityType>, IdentityManagementError> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self.find_nearest(
            IdentityQuery::new(IdentityTypeFilter::Group)
                .with_parameter(IdentityParameter::Path, path)?,
        )
        .await
    }

    #[tracing::instrument(level = "info", skip(self, parent), fields(parent = %parent))]
    pub async fn get_group_with_parent(
        &self,
        name: &str,
        parent: &IdentityType,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        let parent_path = match parent.group_path().filter(|path| !path.is_empty()) {
            Some(path) => path.to_string(),
            None => match self
                .lookup_identity_by_id(IdentityTypeFilter::Group, &parent.id)
                .await?
            {
                Some(group) => group.group_path().unwrap_or_default().to_string(),
                None => return Ok(None),
            },
        };
        self.get_group(&format!("{parent_path}/{name}")).await
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn get_role(&self, name: &str) -> Result<Option<IdentityType>, IdentityManagementError> {
        self.find_nearest(
            IdentityQuery::new(IdentityTypeFilter::Role)
                .with_parameter(IdentityParameter::Name, name)?,
        )
        .await
    }

    /// Visible identities matching the query, sorted and paginated.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn query(
        &self,
        query: IdentityQuery,
    ) -> Result<Vec<IdentityType>, IdentityManagementError> {
        let mut query = query.in_scope(self.scope.clone());
        resolve_relational(self, &mut query).await?;
        if query.id_constraint().is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }
        let stores = self.runtime.registry.identity_stores(
            self.configuration(),
            query.filter(),
            FeatureOperation::Read,
        )?;
        let ctx = self.context();
        let unpaged = query.without_pagination();
        let mut merged: BTreeMap<String, IdentityType> = BTreeMap::new();
        for entry in stores {
            for identity in entry.store.query_identities(&ctx, &unpaged).await? {
                merged.entry(identity.id.clone()).or_insert(identity);
            }
        }
        Ok(order_identities(&query, merged.into_values().collect()))
    }

    /// Number of visible identities matching the query, ignoring the
    /// pagination.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn count(&self, query: IdentityQuery) -> Result<usize, IdentityManagementError> {
        Ok(self.query(query.paginate(0, None)).await?.len())
    }
}

#[async_trait]
impl QuerySource for IdentityManager {
    async fn find_relationships(
        &self,
        query: RelationshipQuery,
    ) -> Result<Vec<Relationship>, IdentityManagementError> {
        self.collect_relationships(query.paginate(0, None)).await
    }

    async fn find_groups(&self) -> Result<Vec<IdentityType>, IdentityManagementError> {
        let Ok(stores) = self.runtime.registry.identity_stores(
            self.configuration(),
            &IdentityTypeFilter::Group,
            FeatureOperation::Read,
        ) else {
            return Ok(Vec::new());
        };
        let ctx = self.context();
        let query = IdentityQuery::new(IdentityTypeFilter::Group).in_scope(self.scope.clone());
        let mut groups = Vec::new();
        for entry in stores {
            groups.extend(entry.store.query_identities(&ctx, &query).await?);
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::credential::CredentialHandlerRegistry;
    use crate::manager::{IdentityConfigurationBuilder, PartitionManager, StoreConfiguration};
    use crate::query::SortField;
    use crate::store::{DefaultContextFactory, FileStoreConfiguration, IdentityCache};

    async fn manager() -> (PartitionManager, IdentityManager) {
        let config = IdentityConfigurationBuilder::new()
            .named(
                "default",
                [StoreConfiguration::file(FileStoreConfiguration::default())],
            )
            .build()
            .unwrap();
        let factory = DefaultContextFactory::new(CredentialHandlerRegistry::new())
            .with_cache(IdentityCache::new(100, None));
        let pm = PartitionManager::new();
        pm.bootstrap(config, Arc::new(factory)).await.unwrap();
        let im = pm.create_identity_manager().await.unwrap();
        (pm, im)
    }

    #[tokio::test]
    async fn test_add_and_lookup() {
        let (_pm, sot) = manager().await;
        let john = sot.add(IdentityType::user("john")).await.unwrap();
        assert!(!john.id.is_empty());
        assert_eq!(sot.partition().id, john.partition_id);
        assert_eq!(
            Some(john.clone()),
            sot.lookup_identity_by_id(IdentityTypeFilter::Agent, &john.id)
                .await
                .unwrap()
        );
        assert_eq!(
            None,
            sot.lookup_identity_by_id(IdentityTypeFilter::Role, &john.id)
                .await
                .unwrap()
        );
        assert_eq!(Some(john.clone()), sot.get_agent("john").await.unwrap());
        assert_eq!(Some(john), sot.get_user("john").await.unwrap());
        assert!(sot.get_user("jane").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_natural_key_unique() {
        let (_pm, sot) = manager().await;
        sot.add(IdentityType::user("john")).await.unwrap();
        assert!(matches!(
            sot.add(IdentityType::agent("john")).await,
            Err(IdentityManagementError::IdentityTypeAlreadyExists { key, .. }) if key == "john"
        ));
        // Roles and groups live in their own key spaces.
        sot.add(IdentityType::role("john")).await.unwrap();
        sot.add(IdentityType::group("john")).await.unwrap();
    }

    #[tokio::test]
    async fn test_group_hierarchy() {
        let (_pm, sot) = manager().await;
        let org = sot.add(IdentityType::group("org")).await.unwrap();
        assert_eq!(Some("/org"), org.group_path());
        let it = sot
            .add(IdentityType::group_with_parent("it", &org))
            .await
            .unwrap();
        assert_eq!(Some("/org/it"), it.group_path());
        assert_eq!(Some(it.clone()), sot.get_group("/org/it").await.unwrap());
        assert_eq!(
            Some(it.clone()),
            sot.get_group_with_parent("it", &org).await.unwrap()
        );
        assert_eq!(Some(org.clone()), sot.get_group("org").await.unwrap());

        let mut orphan = IdentityType::group("orphan");
        if let IdentityKind::Group { parent_id, .. } = &mut orphan.kind {
            *parent_id = Some("missing".into());
        }
        assert!(matches!(
            sot.add(orphan).await,
            Err(IdentityManagementError::GroupParentNotFound { .. })
        ));
        assert!(matches!(
            sot.remove(&org).await,
            Err(IdentityManagementError::InvalidArgument(_))
        ));
        sot.remove(&it).await.unwrap();
        sot.remove(&org).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_keeps_immutable_fields() {
        let (_pm, sot) = manager().await;
        let group = sot.add(IdentityType::group("org")).await.unwrap();
        let mut renamed = group.clone().with_attribute("cost_center", "42");
        if let IdentityKind::Group { name, .. } = &mut renamed.kind {
            *name = "other".into();
        }
        renamed.created_at = Utc::now() + TimeDelta::days(1);
        let updated = sot.update(renamed).await.unwrap();
        assert_eq!(Some("/org"), updated.group_path());
        assert_eq!(group.created_at, updated.created_at);
        assert_eq!(1, updated.attributes.len());

        let mut role = IdentityType::role("admin");
        role.id = group.id.clone();
        assert!(sot.update(role).await.is_err());
        assert!(matches!(
            sot.update(IdentityType::user("ghost")).await,
            Err(IdentityManagementError::IdentityTypeNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_sort_and_count() {
        let (_pm, sot) = manager().await;
        for name in ["carol", "alice", "bob"] {
            sot.add(IdentityType::user(name).with_attribute("team", "blue"))
                .await
                .unwrap();
        }
        sot.add(IdentityType::role("admin")).await.unwrap();
        let query = IdentityQuery::new(IdentityTypeFilter::User)
            .with_parameter(IdentityParameter::Attribute("team".into()), "blue")
            .unwrap()
            .sort_by(SortField::Key, true)
            .paginate(1, Some(1));
        let page = sot.query(query.clone()).await.unwrap();
        assert_eq!(1, page.len());
        assert_eq!(Some("bob"), page[0].login_name());
        assert_eq!(3, sot.count(query).await.unwrap());
        assert_eq!(
            4,
            sot.count(IdentityQuery::new(IdentityTypeFilter::Any))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_remove_unknown() {
        let (_pm, sot) = manager().await;
        let john = sot.add(IdentityType::user("john")).await.unwrap();
        sot.remove(&john).await.unwrap();
        assert!(matches!(
            sot.remove(&john).await,
            Err(IdentityManagementError::IdentityTypeNotFound { .. })
        ));
        assert!(sot.get_user("john").await.unwrap().is_none());
    }
}
