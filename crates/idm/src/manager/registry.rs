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
//! Feature based store resolution.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{IdentityManagementError, SecurityConfigurationError};
use crate::feature::{FeatureGroup, FeatureOperation, FeatureSet};
use crate::manager::configuration::IdmConfiguration;
use crate::store::{IdentityStore, PartitionStore};
use crate::types::{IdentityKind, IdentityTypeFilter, RelationshipKind};

/// Store instance with the features it serves.
#[derive(Clone)]
pub(crate) struct ConfiguredStore {
    pub store: Arc<dyn IdentityStore>,
    pub features: FeatureSet,
}

impl ConfiguredStore {
    fn supports_kind(&self, kind: &IdentityKind, operation: FeatureOperation) -> bool {
        match (kind.feature_group(), kind) {
            (Some(group), _) => self.features.supports(group, operation),
            (None, IdentityKind::Custom { type_name }) => {
                self.features.supports_custom_type(type_name, operation)
            }
            (None, _) => false,
        }
    }

    fn supports_filter(&self, filter: &IdentityTypeFilter, operation: FeatureOperation) -> bool {
        match filter {
            IdentityTypeFilter::Custom(type_name) => {
                self.features.supports_custom_type(type_name, operation)
            }
            other => other
                .feature_groups()
                .iter()
                .any(|group| self.features.supports(*group, operation)),
        }
    }

    pub fn supports_relationship(&self, kind: &RelationshipKind, operation: FeatureOperation) -> bool {
        self.store.relationship_store().is_some()
            && self.features.supports_relationship_feature(kind, operation)
    }

    /// Partition store of the entry.
    pub fn partitions(&self) -> Option<&dyn PartitionStore> {
        self.store.partition_store()
    }

    /// Whether both entries share the store instance.
    pub fn same_as(&self, other: &ConfiguredStore) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.store), Arc::as_ptr(&other.store))
    }
}

impl fmt::Debug for ConfiguredStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfiguredStore")
            .field("driver", &self.store.driver())
            .finish()
    }
}

/// Store instances of all configurations.
#[derive(Debug)]
pub(crate) struct StoreRegistry {
    configurations: HashMap<String, Vec<ConfiguredStore>>,
    multi_realm: HashMap<String, bool>,
    partition_store: Option<ConfiguredStore>,
}

impl StoreRegistry {
    /// Instantiate the stores of the configuration.
    pub fn new(configuration: &IdmConfiguration) -> Self {
        let mut configurations = HashMap::new();
        let mut multi_realm = HashMap::new();
        let mut partition_store = None;
        for cfg in configuration.configurations() {
            let stores: Vec<ConfiguredStore> = cfg
                .stores
                .iter()
                .map(|store| ConfiguredStore {
                    store: store.create_store(),
                    features: store.features().clone(),
                })
                .collect();
            if partition_store.is_none() {
                partition_store = stores
                    .iter()
                    .find(|entry| {
                        entry.features.supports_partitions() && entry.partitions().is_some()
                    })
                    .cloned();
            }
            multi_realm.insert(cfg.name.clone(), cfg.supports_multi_realm());
            configurations.insert(cfg.name.clone(), stores);
        }
        Self {
            configurations,
            multi_realm,
            partition_store,
        }
    }

    /// Every store once.
    pub fn all_stores(&self) -> Vec<&ConfiguredStore> {
        let mut res: Vec<&ConfiguredStore> = Vec::new();
        for entry in self.configurations.values().flatten() {
            if !res.iter().any(|known| known.same_as(entry)) {
                res.push(entry);
            }
        }
        res
    }

    pub fn has_configuration(&self, name: &str) -> bool {
        self.configurations.contains_key(name)
    }

    pub fn supports_multi_realm(&self, name: &str) -> bool {
        self.multi_realm.get(name).copied().unwrap_or_default()
    }

    pub fn configuration(&self, name: &str) -> Result<&[ConfiguredStore], IdentityManagementError> {
        self.configurations
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| SecurityConfigurationError::UnknownConfiguration(name.into()).into())
    }

    pub fn partition_store(&self) -> Option<&ConfiguredStore> {
        self.partition_store.as_ref()
    }

    /// Store serving the operation on the identity kind.
    pub fn identity_store(
        &self,
        configuration: &str,
        kind: &IdentityKind,
        operation: FeatureOperation,
    ) -> Result<&ConfiguredStore, IdentityManagementError> {
        self.configuration(configuration)?
            .iter()
            .find(|entry| entry.supports_kind(kind, operation))
            .ok_or_else(|| IdentityManagementError::UnsupportedIdentityType {
                type_name: kind.type_name().to_string(),
                operation,
            })
    }

    /// Stores serving the operation on any kind the filter spans.
    pub fn identity_stores(
        &self,
        configuration: &str,
        filter: &IdentityTypeFilter,
        operation: FeatureOperation,
    ) -> Result<Vec<&ConfiguredStore>, IdentityManagementError> {
        let stores: Vec<&ConfiguredStore> = self
            .configuration(configuration)?
            .iter()
            .filter(|entry| entry.supports_filter(filter, operation))
            .collect();
        if stores.is_empty() {
            return Err(IdentityManagementError::UnsupportedIdentityType {
                type_name: filter.name().to_string(),
                operation,
            });
        }
        Ok(stores)
    }

    /// Store serving the operation on the relationship kind.
    pub fn relationship_store(
        &self,
        configuration: &str,
        kind: &RelationshipKind,
        operation: FeatureOperation,
    ) -> Result<&ConfiguredStore, IdentityManagementError> {
        self.configuration(configuration)?
            .iter()
            .find(|entry| entry.supports_relationship(kind, operation))
            .ok_or_else(|| IdentityManagementError::UnsupportedRelationshipType {
                type_name: kind.to_string(),
                operation,
            })
    }

    /// Stores able to hold relationships, regardless of the kind.
    pub fn relationship_stores(
        &self,
        configuration: &str,
    ) -> Result<Vec<&ConfiguredStore>, IdentityManagementError> {
        Ok(self
            .configuration(configuration)?
            .iter()
            .filter(|entry| {
                entry.store.relationship_store().is_some()
                    && entry.features.supports_relationships()
            })
            .collect())
    }

    /// Store holding the credentials of the configuration.
    pub fn credential_store(
        &self,
        configuration: &str,
        operation: FeatureOperation,
    ) -> Result<&ConfiguredStore, IdentityManagementError> {
        self.configuration(configuration)?
            .iter()
            .find(|entry| {
                entry.store.credential_store().is_some()
                    && entry.features.supports(FeatureGroup::Credential, operation)
            })
            .ok_or_else(|| IdentityManagementError::UnsupportedIdentityType {
                type_name: FeatureGroup::Credential.to_string(),
                operation,
            })
    }
}
