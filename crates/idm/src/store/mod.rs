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
//! # Identity stores
//!
//! Uniform contract of the backing stores. Every store persists identity
//! types, and may additionally expose relationship, credential and partition
//! capabilities through the sub-store accessors. The [`InvocationContext`]
//! passed to every call carries the partition of the call and the cross
//! cutting services.
//!
//! Stores update the identity cache and raise the store events on every
//! mutation they perform.
use std::fmt;

use async_trait::async_trait;

use crate::credential::CredentialStorage;
use crate::error::IdentityManagementError;
use crate::query::{IdentityQuery, RelationshipQuery};
use crate::types::{IdentityType, Partition, PartitionKind, Relationship};

pub mod cache;
pub mod context;
pub mod file;
pub mod sql;

pub use cache::IdentityCache;
pub use context::{
    DefaultContextFactory, IdGenerator, InvocationContext, InvocationContextFactory,
    REFERENCE_TIME, UuidGenerator,
};
pub use file::{FileIdentityStore, FileStoreConfiguration, FileStoreConfigurationBuilder};
pub use sql::SqlIdentityStore;

/// Number of entities referencing a partition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartitionReferences {
    pub identities: u64,
    pub relationships: u64,
}

impl PartitionReferences {
    pub fn is_empty(&self) -> bool {
        self.identities == 0 && self.relationships == 0
    }
}

impl std::ops::AddAssign for PartitionReferences {
    fn add_assign(&mut self, rhs: Self) {
        self.identities += rhs.identities;
        self.relationships += rhs.relationships;
    }
}

/// Identity type store.
#[async_trait]
pub trait IdentityStore: fmt::Debug + Send + Sync {
    /// Driver name of the store.
    fn driver(&self) -> &str;

    /// Prepare the backing medium.
    async fn setup(&self) -> Result<(), IdentityManagementError> {
        Ok(())
    }

    /// Persist a new identity type, generating its id when empty.
    async fn add_identity(
        &self,
        ctx: &InvocationContext,
        identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError>;

    async fn update_identity(
        &self,
        ctx: &InvocationContext,
        identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError>;

    /// Remove the identity type together with the relationships referencing
    /// it and its credential history, all or nothing.
    async fn remove_identity(
        &self,
        ctx: &InvocationContext,
        identity: &IdentityType,
    ) -> Result<(), IdentityManagementError>;

    /// Identity type by id regardless of its partition.
    async fn get_identity(
        &self,
        ctx: &InvocationContext,
        id: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError>;

    async fn query_identities(
        &self,
        ctx: &InvocationContext,
        query: &IdentityQuery,
    ) -> Result<Vec<IdentityType>, IdentityManagementError>;

    /// Entities stored in the partition.
    async fn partition_references(
        &self,
        partition_id: &str,
    ) -> Result<PartitionReferences, IdentityManagementError>;

    fn relationship_store(&self) -> Option<&dyn RelationshipStore> {
        None
    }

    fn credential_store(&self) -> Option<&dyn CredentialStore> {
        None
    }

    fn partition_store(&self) -> Option<&dyn PartitionStore> {
        None
    }
}

/// Relationship store.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn add_relationship(
        &self,
        ctx: &InvocationContext,
        relationship: Relationship,
    ) -> Result<Relationship, IdentityManagementError>;

    /// Replace the attributes of the relationship.
    async fn update_relationship(
        &self,
        ctx: &InvocationContext,
        relationship: Relationship,
    ) -> Result<Relationship, IdentityManagementError>;

    async fn remove_relationship(
        &self,
        ctx: &InvocationContext,
        relationship: &Relationship,
    ) -> Result<(), IdentityManagementError>;

    async fn get_relationship(
        &self,
        ctx: &InvocationContext,
        id: &str,
    ) -> Result<Option<Relationship>, IdentityManagementError>;

    async fn query_relationships(
        &self,
        ctx: &InvocationContext,
        query: &RelationshipQuery,
    ) -> Result<Vec<Relationship>, IdentityManagementError>;

    /// Remove all relationships referencing the identity, returning their
    /// number.
    async fn remove_relationships_for_identity(
        &self,
        ctx: &InvocationContext,
        identity_id: &str,
    ) -> Result<u64, IdentityManagementError>;
}

/// Credential history store.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Append the record to the history of its identity.
    async fn store_credential(
        &self,
        ctx: &InvocationContext,
        storage: CredentialStorage,
    ) -> Result<(), IdentityManagementError>;

    /// All records of the type, oldest first.
    async fn retrieve_credentials(
        &self,
        ctx: &InvocationContext,
        identity_id: &str,
        storage_type: &str,
    ) -> Result<Vec<CredentialStorage>, IdentityManagementError>;

    async fn remove_credentials(
        &self,
        ctx: &InvocationContext,
        identity_id: &str,
    ) -> Result<u64, IdentityManagementError>;
}

/// Partition (realm and tier) store.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Persist a new partition, generating its id when empty.
    async fn add_partition(&self, partition: Partition)
    -> Result<Partition, IdentityManagementError>;

    async fn update_partition(
        &self,
        partition: Partition,
    ) -> Result<Partition, IdentityManagementError>;

    async fn remove_partition(&self, partition: &Partition) -> Result<(), IdentityManagementError>;

    async fn lookup_partition(&self, id: &str) -> Result<Option<Partition>, IdentityManagementError>;

    async fn get_partition(
        &self,
        kind: PartitionKind,
        name: &str,
    ) -> Result<Option<Partition>, IdentityManagementError>;

    async fn list_partitions(
        &self,
        kind: Option<PartitionKind>,
    ) -> Result<Vec<Partition>, IdentityManagementError>;

    /// Number of tiers having the partition as parent.
    async fn count_children(&self, id: &str) -> Result<u64, IdentityManagementError>;
}
