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
//! # Managers
//!
//! The [`PartitionManager`] is the entry point of the engine. It is
//! bootstrapped exactly once with the store configuration and the context
//! factory, manages the partitions (realms and tiers) and hands out
//! [`IdentityManager`] instances bound to a single partition.
//!
//! Every operation resolves the store serving it through the feature sets of
//! the configuration the partition is bound to.
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{debug, info};
use validator::Validate;

use crate::error::{IdentityManagementError, SecurityConfigurationError};
use crate::event::IdmEvent;
use crate::feature::FeatureOperation;
use crate::store::{InvocationContextFactory, PartitionReferences};
use crate::types::{Partition, PartitionKind};

mod configuration;
mod credential;
mod identity;
mod registry;
mod relationship;

pub use configuration::{
    IdentityConfiguration, IdentityConfigurationBuilder, IdmConfiguration, StoreConfiguration,
};
pub use identity::IdentityManager;

use registry::{ConfiguredStore, StoreRegistry};

/// Lifecycle state of the [`PartitionManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerState {
    /// Not bootstrapped yet.
    Unconfigured,
    /// Bootstrap in progress.
    Bootstrapped,
    /// Ready to serve.
    Operational,
}

/// Services shared by the partition manager and its identity managers.
pub(crate) struct Runtime {
    pub registry: StoreRegistry,
    pub context_factory: Arc<dyn InvocationContextFactory>,
    pub default_realm: String,
    pub default_configuration: String,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("default_realm", &self.default_realm)
            .finish()
    }
}

impl Runtime {
    /// Realm standing in for the partition store when there is none.
    fn synthetic_realm(&self) -> Partition {
        let mut realm = Partition::realm(self.default_realm.clone());
        realm.id = self.default_realm.clone();
        realm.configuration_name = self.default_configuration.clone();
        realm
    }

    fn partition_store(&self) -> Result<&ConfiguredStore, IdentityManagementError> {
        self.registry
            .partition_store()
            .ok_or(IdentityManagementError::PartitionStoreNotConfigured)
    }

    pub async fn lookup_partition(
        &self,
        id: &str,
    ) -> Result<Option<Partition>, IdentityManagementError> {
        match self.registry.partition_store() {
            Some(entry) => match entry.partitions() {
                Some(store) => store.lookup_partition(id).await,
                None => Err(IdentityManagementError::PartitionStoreNotConfigured),
            },
            None => {
                let realm = self.synthetic_realm();
                Ok((realm.id == id).then_some(realm))
            }
        }
    }

    pub async fn get_partition(
        &self,
        kind: PartitionKind,
        name: &str,
    ) -> Result<Option<Partition>, IdentityManagementError> {
        match self.registry.partition_store() {
            Some(entry) => match entry.partitions() {
                Some(store) => store.get_partition(kind, name).await,
                None => Err(IdentityManagementError::PartitionStoreNotConfigured),
            },
            None => {
                let realm = self.synthetic_realm();
                Ok((kind == PartitionKind::Realm && realm.name == name).then_some(realm))
            }
        }
    }

    /// Partitions visible from the partition, nearest first.
    ///
    /// A realm sees itself only, a tier sees itself and its ancestor tiers.
    pub async fn scope_of(&self, partition: &Partition) -> Result<Vec<String>, IdentityManagementError> {
        let mut scope = vec![partition.id.clone()];
        let mut visited: HashSet<String> = HashSet::from([partition.id.clone()]);
        let mut parent = match partition.kind {
            PartitionKind::Realm => None,
            PartitionKind::Tier => partition.parent_id.clone(),
        };
        while let Some(id) = parent {
            if !visited.insert(id.clone()) {
                break;
            }
            let Some(tier) = self.lookup_partition(&id).await? else {
                break;
            };
            scope.push(tier.id.clone());
            parent = tier.parent_id.clone();
        }
        Ok(scope)
    }
}

/// Entry point of the identity management engine.
#[derive(Debug, Default)]
pub struct PartitionManager {
    runtime: OnceLock<Arc<Runtime>>,
    bootstrapping: AtomicBool,
}

impl PartitionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ManagerState {
        if self.runtime.get().is_some() {
            ManagerState::Operational
        } else if self.bootstrapping.load(Ordering::SeqCst) {
            ManagerState::Bootstrapped
        } else {
            ManagerState::Unconfigured
        }
    }

    fn runtime(&self) -> Result<&Arc<Runtime>, IdentityManagementError> {
        self.runtime
            .get()
            .ok_or_else(|| SecurityConfigurationError::NotBootstrapped.into())
    }

    /// Create the stores, prepare their media and make sure the default
    /// realm exists.
    ///
    /// Fails with [`SecurityConfigurationError::AlreadyBootstrapped`] when
    /// called more than once. A failed bootstrap may be retried.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn bootstrap(
        &self,
        configuration: IdmConfiguration,
        context_factory: Arc<dyn InvocationContextFactory>,
    ) -> Result<(), IdentityManagementError> {
        if self
            .bootstrapping
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SecurityConfigurationError::AlreadyBootstrapped.into());
        }
        match Self::initialize(configuration, context_factory).await {
            Ok(runtime) => {
                if self.runtime.set(Arc::new(runtime)).is_err() {
                    return Err(SecurityConfigurationError::AlreadyBootstrapped.into());
                }
                info!("partition manager is operational");
                Ok(())
            }
            Err(err) => {
                self.bootstrapping.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    async fn initialize(
        configuration: IdmConfiguration,
        context_factory: Arc<dyn InvocationContextFactory>,
    ) -> Result<Runtime, IdentityManagementError> {
        let runtime = Runtime {
            registry: StoreRegistry::new(&configuration),
            context_factory,
            default_realm: configuration.default_realm().to_string(),
            default_configuration: configuration.default_configuration().to_string(),
        };
        for entry in runtime.registry.all_stores() {
            debug!("setting up the {} identity store", entry.store.driver());
            entry.store.setup().await.map_err(|err| {
                SecurityConfigurationError::StoreSetup {
                    driver: entry.store.driver().to_string(),
                    message: err.to_string(),
                }
            })?;
        }
        if let Some(store) = runtime.registry.partition_store().and_then(|x| x.partitions())
            && store
                .get_partition(PartitionKind::Realm, &runtime.default_realm)
                .await?
                .is_none()
        {
            let mut realm = Partition::realm(runtime.default_realm.clone());
            realm.configuration_name = runtime.default_configuration.clone();
            let realm = store.add_partition(realm).await?;
            info!("created the default realm {}", realm.name);
            runtime
                .context_factory
                .create_context(&realm, vec![realm.id.clone()])
                .raise_event(IdmEvent::PartitionCreated(realm));
        }
        Ok(runtime)
    }

    fn check_partition_feature(
        entry: &ConfiguredStore,
        kind: PartitionKind,
        operation: FeatureOperation,
    ) -> Result<(), IdentityManagementError> {
        if entry.features.supports(kind.feature_group(), operation) {
            Ok(())
        } else {
            Err(IdentityManagementError::UnsupportedIdentityType {
                type_name: kind.feature_group().to_string(),
                operation,
            })
        }
    }

    fn raise_event(runtime: &Runtime, partition: &Partition, event: IdmEvent) {
        runtime
            .context_factory
            .create_context(partition, vec![partition.id.clone()])
            .raise_event(event);
    }

    /// Store a new realm or tier bound to the named configuration.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn add_partition(
        &self,
        partition: Partition,
        configuration_name: &str,
    ) -> Result<Partition, IdentityManagementError> {
        let runtime = self.runtime()?;
        let entry = runtime.partition_store()?;
        Self::check_partition_feature(entry, partition.kind, FeatureOperation::Create)?;
        let store = entry
            .partitions()
            .ok_or(IdentityManagementError::PartitionStoreNotConfigured)?;
        if !runtime.registry.has_configuration(configuration_name) {
            return Err(
                SecurityConfigurationError::UnknownConfiguration(configuration_name.into()).into(),
            );
        }
        if partition.is_realm() && !runtime.registry.supports_multi_realm(configuration_name) {
            return Err(IdentityManagementError::UnsupportedMultiRealm(
                configuration_name.into(),
            ));
        }

        let mut partition = partition;
        partition.configuration_name = configuration_name.to_string();
        partition.validate()?;
        match (partition.kind, &partition.parent_id) {
            (PartitionKind::Realm, Some(_)) => {
                return Err(IdentityManagementError::InvalidArgument(format!(
                    "realm {} can not have a parent",
                    partition.name
                )));
            }
            (PartitionKind::Tier, Some(parent_id)) => {
                let parent = store.lookup_partition(parent_id).await?;
                if !parent.is_some_and(|p| p.is_tier()) {
                    return Err(IdentityManagementError::PartitionInvalidParent {
                        name: partition.name.clone(),
                        parent: parent_id.clone(),
                    });
                }
            }
            _ => {}
        }
        if store
            .get_partition(partition.kind, &partition.name)
            .await?
            .is_some()
        {
            return Err(IdentityManagementError::PartitionAlreadyExists {
                kind: partition.kind.to_string(),
                name: partition.name.clone(),
            });
        }
        let created = store.add_partition(partition).await?;
        Self::raise_event(runtime, &created, IdmEvent::PartitionCreated(created.clone()));
        Ok(created)
    }

    /// Update the name, configuration or attributes of a partition.
    ///
    /// The kind and the parent of a partition can not be changed.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn update_partition(
        &self,
        partition: Partition,
    ) -> Result<Partition, IdentityManagementError> {
        let runtime = self.runtime()?;
        let entry = runtime.partition_store()?;
        Self::check_partition_feature(entry, partition.kind, FeatureOperation::Update)?;
        let store = entry
            .partitions()
            .ok_or(IdentityManagementError::PartitionStoreNotConfigured)?;
        let current = store
            .lookup_partition(&partition.id)
            .await?
            .ok_or_else(|| IdentityManagementError::PartitionNotFound(partition.id.clone()))?;
        if !runtime.registry.has_configuration(&partition.configuration_name) {
            return Err(SecurityConfigurationError::UnknownConfiguration(
                partition.configuration_name.clone(),
            )
            .into());
        }
        let mut updated = partition;
        updated.kind = current.kind;
        updated.parent_id = current.parent_id;
        updated.validate()?;
        let updated = store.update_partition(updated).await?;
        Self::raise_event(runtime, &updated, IdmEvent::PartitionUpdated(updated.clone()));
        Ok(updated)
    }

    /// Remove a partition no identity, relationship or tier refers to.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn remove_partition(&self, partition: &Partition) -> Result<(), IdentityManagementError> {
        let runtime = self.runtime()?;
        let entry = runtime.partition_store()?;
        Self::check_partition_feature(entry, partition.kind, FeatureOperation::Delete)?;
        let store = entry
            .partitions()
            .ok_or(IdentityManagementError::PartitionStoreNotConfigured)?;
        let current = store
            .lookup_partition(&partition.id)
            .await?
            .ok_or_else(|| IdentityManagementError::PartitionNotFound(partition.name.clone()))?;

        let children = store.count_children(&current.id).await?;
        if children > 0 {
            return Err(IdentityManagementError::PartitionHasChildren {
                name: current.name.clone(),
                children,
            });
        }
        let mut references = PartitionReferences::default();
        for entry in runtime.registry.all_stores() {
            references += entry.store.partition_references(&current.id).await?;
        }
        if !references.is_empty() {
            return Err(IdentityManagementError::PartitionNotEmpty {
                name: current.name.clone(),
                identities: references.identities,
                relationships: references.relationships,
            });
        }
        store.remove_partition(&current).await?;
        Self::raise_event(runtime, &current, IdmEvent::PartitionDeleted(current.clone()));
        Ok(())
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn get_partition(
        &self,
        kind: PartitionKind,
        name: &str,
    ) -> Result<Option<Partition>, IdentityManagementError> {
        self.runtime()?.get_partition(kind, name).await
    }

    #[tracing::instrument(level = "info", skip(self))]
    pub async fn lookup_partition_by_id(
        &self,
        id: &str,
    ) -> Result<Option<Partition>, IdentityManagementError> {
        self.runtime()?.lookup_partition(id).await
    }

    /// Partitions of the kind, all of them when `None`, ordered by name.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn list_partitions(
        &self,
        kind: Option<PartitionKind>,
    ) -> Result<Vec<Partition>, IdentityManagementError> {
        let runtime = self.runtime()?;
        match runtime.registry.partition_store() {
            Some(entry) => {
                entry
                    .partitions()
                    .ok_or(IdentityManagementError::PartitionStoreNotConfigured)?
                    .list_partitions(kind)
                    .await
            }
            None => Ok(if kind == Some(PartitionKind::Tier) {
                Vec::new()
            } else {
                vec![runtime.synthetic_realm()]
            }),
        }
    }

    /// Identity manager of the default realm.
    pub async fn create_identity_manager(&self) -> Result<IdentityManager, IdentityManagementError> {
        let name = self.runtime()?.default_realm.clone();
        self.for_realm(&name).await
    }

    pub async fn for_realm(&self, name: &str) -> Result<IdentityManager, IdentityManagementError> {
        let partition = self
            .get_partition(PartitionKind::Realm, name)
            .await?
            .ok_or_else(|| IdentityManagementError::PartitionNotFound(name.into()))?;
        self.identity_manager_for(&partition).await
    }

    pub async fn for_tier(&self, name: &str) -> Result<IdentityManager, IdentityManagementError> {
        let partition = self
            .get_partition(PartitionKind::Tier, name)
            .await?
            .ok_or_else(|| IdentityManagementError::PartitionNotFound(name.into()))?;
        self.identity_manager_for(&partition).await
    }

    /// Identity manager bound to the stored state of the partition.
    pub async fn identity_manager_for(
        &self,
        partition: &Partition,
    ) -> Result<IdentityManager, IdentityManagementError> {
        let runtime = self.runtime()?;
        let partition = runtime
            .lookup_partition(&partition.id)
            .await?
            .ok_or_else(|| IdentityManagementError::PartitionNotFound(partition.name.clone()))?;
        if !runtime.registry.has_configuration(&partition.configuration_name) {
            return Err(SecurityConfigurationError::UnknownConfiguration(
                partition.configuration_name.clone(),
            )
            .into());
        }
        let scope = runtime.scope_of(&partition).await?;
        Ok(IdentityManager::new(runtime.clone(), partition, scope))
    }
}
