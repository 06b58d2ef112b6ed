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
//! Identity configurations.
//!
//! A configuration is a named list of stores, each with the features it
//! serves. Partitions are bound to a configuration by name.
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use secrecy::ExposeSecret;
use tracing::debug;

use crate::config::Config;
use crate::error::{DbContextExt, IdentityManagementError, SecurityConfigurationError};
use crate::feature::FeatureSet;
use crate::plugin_manager::PluginManager;
use crate::store::{FileIdentityStore, FileStoreConfiguration, IdentityStore, SqlIdentityStore};
use crate::types::{DEFAULT_CONFIGURATION, DEFAULT_REALM};

#[derive(Clone)]
enum StoreDriver {
    File(FileStoreConfiguration),
    Sql(Arc<DatabaseConnection>),
    Custom {
        name: String,
        store: Arc<dyn IdentityStore>,
    },
}

/// Store entry of a configuration.
#[derive(Clone)]
pub struct StoreConfiguration {
    driver: StoreDriver,
    features: FeatureSet,
}

impl StoreConfiguration {
    /// File store supporting every feature.
    pub fn file(config: FileStoreConfiguration) -> Self {
        Self {
            driver: StoreDriver::File(config),
            features: FeatureSet::all(),
        }
    }

    /// SQL store supporting every feature.
    pub fn sql(db: DatabaseConnection) -> Self {
        Self {
            driver: StoreDriver::Sql(Arc::new(db)),
            features: FeatureSet::all(),
        }
    }

    /// Application provided store. It declares no feature until
    /// [`with_features`](Self::with_features) is called.
    pub fn custom<S: Into<String>>(name: S, store: Arc<dyn IdentityStore>) -> Self {
        Self {
            driver: StoreDriver::Custom {
                name: name.into(),
                store,
            },
            features: FeatureSet::default(),
        }
    }

    /// Replace the supported features.
    pub fn with_features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn driver_name(&self) -> &str {
        match &self.driver {
            StoreDriver::File(_) => "file",
            StoreDriver::Sql(_) => "sql",
            StoreDriver::Custom { name, .. } => name,
        }
    }

    pub(crate) fn create_store(&self) -> Arc<dyn IdentityStore> {
        match &self.driver {
            StoreDriver::File(config) => Arc::new(FileIdentityStore::new(config.clone())),
            StoreDriver::Sql(db) => Arc::new(SqlIdentityStore::new(db.clone())),
            StoreDriver::Custom { store, .. } => store.clone(),
        }
    }
}

impl fmt::Debug for StoreConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfiguration")
            .field("driver", &self.driver_name())
            .field("features", &self.features)
            .finish()
    }
}

/// Named list of stores.
#[derive(Clone, Debug)]
pub struct IdentityConfiguration {
    pub name: String,
    pub stores: Vec<StoreConfiguration>,
}

impl IdentityConfiguration {
    pub fn supports_multi_realm(&self) -> bool {
        self.stores
            .iter()
            .any(|store| store.features().supports_multi_realm())
    }
}

/// Validated set of configurations handed to the partition manager.
#[derive(Clone, Debug)]
pub struct IdmConfiguration {
    configurations: Vec<IdentityConfiguration>,
    default_realm: String,
}

impl IdmConfiguration {
    pub fn configurations(&self) -> &[IdentityConfiguration] {
        &self.configurations
    }

    pub fn configuration(&self, name: &str) -> Option<&IdentityConfiguration> {
        self.configurations.iter().find(|cfg| cfg.name == name)
    }

    /// Name of the realm used by [`crate::PartitionManager::create_identity_manager`].
    pub fn default_realm(&self) -> &str {
        &self.default_realm
    }

    /// Configuration the default realm is bound to.
    pub fn default_configuration(&self) -> &str {
        self.configuration(DEFAULT_CONFIGURATION)
            .or(self.configurations.first())
            .map(|cfg| cfg.name.as_str())
            .unwrap_or(DEFAULT_CONFIGURATION)
    }

    /// Single "default" configuration with the store selected by the
    /// `[identity]` driver.
    pub async fn from_config(
        config: &Config,
        plugin_manager: &PluginManager,
    ) -> Result<Self, IdentityManagementError> {
        let driver = config.identity.driver.as_str();
        let store = if let Some(store) = plugin_manager.get_identity_store(driver) {
            StoreConfiguration::custom(driver, store.clone()).with_features(FeatureSet::all())
        } else {
            match driver {
                "file" => StoreConfiguration::file(FileStoreConfiguration::from(&config.file_store)),
                "sql" => {
                    let connection = config.database.get_connection().ok_or_else(|| {
                        SecurityConfigurationError::StoreSetup {
                            driver: driver.to_string(),
                            message: "database connection is not configured".into(),
                        }
                    })?;
                    let opt = ConnectOptions::new(connection.expose_secret())
                        // Prevent dumping the password in plaintext.
                        .sqlx_logging(false)
                        .to_owned();
                    debug!("establishing the database connection");
                    let db = Database::connect(opt)
                        .await
                        .context("connecting to the identity database")?;
                    StoreConfiguration::sql(db)
                }
                other => {
                    return Err(SecurityConfigurationError::UnsupportedDriver(other.into()).into());
                }
            }
        };
        Ok(IdentityConfigurationBuilder::new()
            .default_realm(config.identity.default_realm.clone())
            .named(DEFAULT_CONFIGURATION, [store])
            .build()?)
    }
}

/// Builder of the [`IdmConfiguration`].
#[derive(Debug, Default)]
pub struct IdentityConfigurationBuilder {
    configurations: Vec<IdentityConfiguration>,
    default_realm: Option<String>,
}

impl IdentityConfigurationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration.
    pub fn named<N, I>(mut self, name: N, stores: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = StoreConfiguration>,
    {
        self.configurations.push(IdentityConfiguration {
            name: name.into(),
            stores: stores.into_iter().collect(),
        });
        self
    }

    pub fn default_realm<S: Into<String>>(mut self, name: S) -> Self {
        self.default_realm = Some(name.into());
        self
    }

    /// Validate the configurations.
    pub fn build(self) -> Result<IdmConfiguration, SecurityConfigurationError> {
        if self.configurations.is_empty() {
            return Err(SecurityConfigurationError::NoConfiguration);
        }
        let mut names = HashSet::new();
        let mut partition_stores = 0;
        for cfg in &self.configurations {
            if !names.insert(cfg.name.as_str()) {
                return Err(SecurityConfigurationError::DuplicateConfiguration(
                    cfg.name.clone(),
                ));
            }
            if cfg.stores.is_empty() {
                return Err(SecurityConfigurationError::NoStoreConfigured(cfg.name.clone()));
            }
            let credential_stores = cfg
                .stores
                .iter()
                .filter(|store| store.features().supports_credentials())
                .count();
            if credential_stores > 1 {
                return Err(SecurityConfigurationError::MultipleCredentialStores(
                    cfg.name.clone(),
                ));
            }
            partition_stores += cfg
                .stores
                .iter()
                .filter(|store| store.features().supports_partitions())
                .count();
        }
        if partition_stores > 1 {
            return Err(SecurityConfigurationError::MultiplePartitionStores);
        }
        Ok(IdmConfiguration {
            configurations: self.configurations,
            default_realm: self.default_realm.unwrap_or_else(|| DEFAULT_REALM.to_string()),
        })
    }
}
