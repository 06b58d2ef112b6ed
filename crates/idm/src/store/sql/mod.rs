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
//! # SQL identity store
//!
//! Relational store on top of sea-orm. All four store capabilities are
//! backed by the tables of the [`crate::db_migration`] schema. Operations
//! touching more than one row run in a transaction.
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::credential::CredentialStorage;
use crate::db_migration::Migrator;
use crate::error::{DbContextExt, IdentityManagementError};
use crate::event::IdmEvent;
use crate::query::{IdentityQuery, RelationshipQuery};
use crate::store::{
    CredentialStore, IdentityStore, InvocationContext, PartitionReferences, PartitionStore,
    RelationshipStore,
};
use crate::types::{IdentityType, Partition, PartitionKind, Relationship};

mod credential;
mod identity;
mod partition;
mod relationship;

/// Store persisting into a relational database.
#[derive(Clone, Debug)]
pub struct SqlIdentityStore {
    db: Arc<DatabaseConnection>,
}

impl SqlIdentityStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }
}

#[async_trait]
impl IdentityStore for SqlIdentityStore {
    fn driver(&self) -> &str {
        "sql"
    }

    /// Apply the pending schema migrations.
    #[tracing::instrument(level = "debug", skip(self))]
    async fn setup(&self) -> Result<(), IdentityManagementError> {
        Migrator::up(self.connection(), None)
            .await
            .context("applying the identity schema migrations")?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn add_identity(
        &self,
        ctx: &InvocationContext,
        mut identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        if identity.id.is_empty() {
            identity.id = ctx.generate_id();
        }
        identity::create(self.connection(), &identity).await?;
        if let Some(cache) = ctx.cache() {
            cache.put(&identity);
        }
        ctx.raise_event(IdmEvent::IdentityTypeCreated(identity.clone()));
        Ok(identity)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn update_identity(
        &self,
        ctx: &InvocationContext,
        identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        identity::update(self.connection(), &identity).await?;
        if let Some(cache) = ctx.cache() {
            cache.put(&identity);
        }
        ctx.raise_event(IdmEvent::IdentityTypeUpdated(identity.clone()));
        Ok(identity)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn remove_identity(
        &self,
        ctx: &InvocationContext,
        identity: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        let removed = identity::delete(self.connection(), identity).await?;
        if let Some(cache) = ctx.cache() {
            cache.invalidate(&identity.partition_id, &identity.id);
        }
        for relationship in removed {
            ctx.raise_event(IdmEvent::RelationshipDeleted(relationship));
        }
        ctx.raise_event(IdmEvent::IdentityTypeDeleted(identity.clone()));
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn get_identity(
        &self,
        _ctx: &InvocationContext,
        id: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        identity::get(self.connection(), id).await
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn query_identities(
        &self,
        _ctx: &InvocationContext,
        query: &IdentityQuery,
    ) -> Result<Vec<IdentityType>, IdentityManagementError> {
        identity::list(self.connection(), query).await
    }

    async fn partition_references(
        &self,
        partition_id: &str,
    ) -> Result<PartitionReferences, IdentityManagementError> {
        Ok(PartitionReferences {
            identities: identity::count_in_partition(self.connection(), partition_id).await?,
            relationships: relationship::count_in_partition(self.connection(), partition_id).await?,
        })
    }

    fn relationship_store(&self) -> Option<&dyn RelationshipStore> {
        Some(self)
    }

    fn credential_store(&self) -> Option<&dyn CredentialStore> {
        Some(self)
    }

    fn partition_store(&self) -> Option<&dyn PartitionStore> {
        Some(self)
    }
}

#[async_trait]
impl RelationshipStore for SqlIdentityStore {
    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn add_relationship(
        &self,
        ctx: &InvocationContext,
        mut rel: Relationship,
    ) -> Result<Relationship, IdentityManagementError> {
        if rel.id.is_empty() {
            rel.id = ctx.generate_id();
        }
        relationship::create(self.connection(), &rel).await?;
        ctx.raise_event(IdmEvent::RelationshipCreated(rel.clone()));
        Ok(rel)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn update_relationship(
        &self,
        ctx: &InvocationContext,
        rel: Relationship,
    ) -> Result<Relationship, IdentityManagementError> {
        relationship::update(self.connection(), &rel).await?;
        ctx.raise_event(IdmEvent::RelationshipUpdated(rel.clone()));
        Ok(rel)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn remove_relationship(
        &self,
        ctx: &InvocationContext,
        rel: &Relationship,
    ) -> Result<(), IdentityManagementError> {
        relationship::delete(self.connection(), rel).await?;
        ctx.raise_event(IdmEvent::RelationshipDeleted(rel.clone()));
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn get_relationship(
        &self,
        _ctx: &InvocationContext,
        id: &str,
    ) -> Result<Option<Relationship>, IdentityManagementError> {
        relationship::get(self.connection(), id).await
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn query_relationships(
        &self,
        _ctx: &InvocationContext,
        query: &RelationshipQuery,
    ) -> Result<Vec<Relationship>, IdentityManagementError> {
        relationship::list(self.connection(), query).await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn remove_relationships_for_identity(
        &self,
        ctx: &InvocationContext,
        identity_id: &str,
    ) -> Result<u64, IdentityManagementError> {
        use sea_orm::TransactionTrait;

        let txn = self
            .db
            .begin()
            .await
            .context("starting transaction for removing identity relationships")?;
        let removed = relationship::delete_for_identity(&txn, identity_id).await?;
        txn.commit()
            .await
            .context("committing the identity relationships removal")?;
        let count = removed.len() as u64;
        for rel in removed {
            ctx.raise_event(IdmEvent::RelationshipDeleted(rel));
        }
        Ok(count)
    }
}

#[async_trait]
impl CredentialStore for SqlIdentityStore {
    #[tracing::instrument(level = "debug", skip(self, _ctx, storage), fields(identity_id = %storage.identity_id))]
    async fn store_credential(
        &self,
        _ctx: &InvocationContext,
        storage: CredentialStorage,
    ) -> Result<(), IdentityManagementError> {
        credential::create(self.connection(), &storage).await
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn retrieve_credentials(
        &self,
        _ctx: &InvocationContext,
        identity_id: &str,
        storage_type: &str,
    ) -> Result<Vec<CredentialStorage>, IdentityManagementError> {
        credential::list(self.connection(), identity_id, storage_type).await
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn remove_credentials(
        &self,
        _ctx: &InvocationContext,
        identity_id: &str,
    ) -> Result<u64, IdentityManagementError> {
        credential::delete(self.connection(), identity_id).await
    }
}

#[async_trait]
impl PartitionStore for SqlIdentityStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn add_partition(
        &self,
        mut value: Partition,
    ) -> Result<Partition, IdentityManagementError> {
        if value.id.is_empty() {
            value.id = Uuid::new_v4().simple().to_string();
        }
        partition::create(self.connection(), &value).await?;
        Ok(value)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn update_partition(
        &self,
        value: Partition,
    ) -> Result<Partition, IdentityManagementError> {
        partition::update(self.connection(), &value).await?;
        Ok(value)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn remove_partition(&self, value: &Partition) -> Result<(), IdentityManagementError> {
        partition::delete(self.connection(), value).await
    }

    async fn lookup_partition(&self, id: &str) -> Result<Option<Partition>, IdentityManagementError> {
        partition::get(self.connection(), id).await
    }

    async fn get_partition(
        &self,
        kind: PartitionKind,
        name: &str,
    ) -> Result<Option<Partition>, IdentityManagementError> {
        partition::get_by_name(self.connection(), kind, name).await
    }

    async fn list_partitions(
        &self,
        kind: Option<PartitionKind>,
    ) -> Result<Vec<Partition>, IdentityManagementError> {
        partition::list(self.connection(), kind).await
    }

    async fn count_children(&self, id: &str) -> Result<u64, IdentityManagementError> {
        partition::count_children(self.connection(), id).await
    }
}
