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
//! In-memory data of the file store.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::credential::CredentialStorage;
use crate::error::IdentityManagementError;
use crate::store::PartitionReferences;
use crate::types::{IdentityType, Partition, PartitionKind, Relationship};

/// Complete content of the store.
///
/// Mutations are applied to a copy which replaces the current state only
/// once it has been persisted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FileState {
    pub partitions: BTreeMap<String, Partition>,
    pub identities: BTreeMap<String, IdentityType>,
    pub relationships: BTreeMap<String, Relationship>,
    /// Credential history per identity id in insertion order.
    pub credentials: BTreeMap<String, Vec<CredentialStorage>>,
}

impl FileState {
    fn check_unique(&self, identity: &IdentityType) -> Result<(), IdentityManagementError> {
        let Some(key) = identity.kind.natural_key() else {
            return Ok(());
        };
        let space = identity.kind.key_space();
        let duplicate = self.identities.values().any(|other| {
            other.id != identity.id
                && other.partition_id == identity.partition_id
                && other.kind.key_space() == space
                && other.kind.natural_key() == Some(key)
        });
        if duplicate {
            return Err(IdentityManagementError::IdentityTypeAlreadyExists {
                type_name: identity.type_name().to_string(),
                key: key.to_string(),
                partition: identity.partition_id.clone(),
            });
        }
        Ok(())
    }

    pub fn insert_identity(&mut self, identity: IdentityType) -> Result<(), IdentityManagementError> {
        if self.identities.contains_key(&identity.id) {
            return Err(IdentityManagementError::IdentityTypeAlreadyExists {
                type_name: identity.type_name().to_string(),
                key: identity.id.clone(),
                partition: identity.partition_id.clone(),
            });
        }
        self.check_unique(&identity)?;
        self.identities.insert(identity.id.clone(), identity);
        Ok(())
    }

    pub fn replace_identity(&mut self, identity: IdentityType) -> Result<(), IdentityManagementError> {
        if !self.identities.contains_key(&identity.id) {
            return Err(IdentityManagementError::IdentityTypeNotFound {
                id: identity.id.clone(),
                partition: identity.partition_id.clone(),
            });
        }
        self.check_unique(&identity)?;
        self.identities.insert(identity.id.clone(), identity);
        Ok(())
    }

    /// Remove the identity with its relationships and credentials.
    pub fn delete_identity(
        &mut self,
        identity: &IdentityType,
    ) -> Result<Vec<Relationship>, IdentityManagementError> {
        if self.identities.remove(&identity.id).is_none() {
            return Err(IdentityManagementError::IdentityTypeNotFound {
                id: identity.id.clone(),
                partition: identity.partition_id.clone(),
            });
        }
        self.credentials.remove(&identity.id);
        Ok(self.delete_relationships_for(&identity.id))
    }

    pub fn insert_relationship(&mut self, relationship: Relationship) {
        self.relationships
            .insert(relationship.id.clone(), relationship);
    }

    pub fn replace_relationship(
        &mut self,
        relationship: Relationship,
    ) -> Result<(), IdentityManagementError> {
        match self.relationships.get_mut(&relationship.id) {
            Some(current) => {
                *current = relationship;
                Ok(())
            }
            None => Err(IdentityManagementError::RelationshipNotFound {
                id: relationship.id.clone(),
                partition: relationship.partition_id.clone(),
            }),
        }
    }

    pub fn delete_relationship(
        &mut self,
        relationship: &Relationship,
    ) -> Result<(), IdentityManagementError> {
        self.relationships
            .remove(&relationship.id)
            .map(|_| ())
            .ok_or_else(|| IdentityManagementError::RelationshipNotFound {
                id: relationship.id.clone(),
                partition: relationship.partition_id.clone(),
            })
    }

    pub fn delete_relationships_for(&mut self, identity_id: &str) -> Vec<Relationship> {
        let (removed, kept): (BTreeMap<_, _>, BTreeMap<_, _>) =
            std::mem::take(&mut self.relationships)
                .into_iter()
                .partition(|(_, rel)| rel.references(identity_id));
        self.relationships = kept;
        removed.into_values().collect()
    }

    pub fn append_credential(&mut self, storage: CredentialStorage) {
        self.credentials
            .entry(storage.identity_id.clone())
            .or_default()
            .push(storage);
    }

    pub fn credentials_of(&self, identity_id: &str, storage_type: &str) -> Vec<CredentialStorage> {
        let mut history: Vec<CredentialStorage> = self
            .credentials
            .get(identity_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|rec| rec.storage_type == storage_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        // Stable, records with equal dates stay in insertion order.
        history.sort_by_key(|rec| rec.effective_date);
        history
    }

    pub fn delete_credentials(&mut self, identity_id: &str) -> u64 {
        self.credentials
            .remove(identity_id)
            .map(|records| records.len() as u64)
            .unwrap_or_default()
    }

    pub fn find_partition(&self, kind: PartitionKind, name: &str) -> Option<&Partition> {
        self.partitions
            .values()
            .find(|p| p.kind == kind && p.name == name)
    }

    pub fn insert_partition(&mut self, partition: Partition) -> Result<(), IdentityManagementError> {
        if self.partitions.contains_key(&partition.id)
            || self.find_partition(partition.kind, &partition.name).is_some()
        {
            return Err(IdentityManagementError::PartitionAlreadyExists {
                kind: partition.kind.to_string(),
                name: partition.name.clone(),
            });
        }
        self.partitions.insert(partition.id.clone(), partition);
        Ok(())
    }

    pub fn replace_partition(&mut self, partition: Partition) -> Result<(), IdentityManagementError> {
        if !self.partitions.contains_key(&partition.id) {
            return Err(IdentityManagementError::PartitionNotFound(partition.name.clone()));
        }
        if self
            .find_partition(partition.kind, &partition.name)
            .is_some_and(|other| other.id != partition.id)
        {
            return Err(IdentityManagementError::PartitionAlreadyExists {
                kind: partition.kind.to_string(),
                name: partition.name.clone(),
            });
        }
        self.partitions.insert(partition.id.clone(), partition);
        Ok(())
    }

    pub fn delete_partition(&mut self, partition: &Partition) -> Result<(), IdentityManagementError> {
        self.partitions
            .remove(&partition.id)
            .map(|_| ())
            .ok_or_else(|| IdentityManagementError::PartitionNotFound(partition.name.clone()))
    }

    pub fn partition_references(&self, partition_id: &str) -> PartitionReferences {
        PartitionReferences {
            identities: self
                .identities
                .values()
                .filter(|x| x.partition_id == partition_id)
                .count() as u64,
            relationships: self
                .relationships
                .values()
                .filter(|x| x.partition_id == partition_id)
                .count() as u64,
        }
    }

    pub fn count_children(&self, partition_id: &str) -> u64 {
        self.partitions
            .values()
            .filter(|p| p.parent_id.as_deref() == Some(partition_id))
            .count() as u64
    }
}
