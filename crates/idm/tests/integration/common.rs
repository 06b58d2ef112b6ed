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

use std::sync::Arc;

use eyre::{Result, WrapErr};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use uuid::Uuid;

use idm::PartitionManager;
use idm::credential::CredentialHandlerRegistry;
use idm::credential::password_hashing::PasswordHashing;
use idm::event::EventBridge;
use idm::manager::{IdentityConfigurationBuilder, IdmConfiguration, StoreConfiguration};
use idm::store::{DefaultContextFactory, FileStoreConfiguration};

/// Context factory with the built-in credential handlers.
pub fn context_factory(event_bridge: Option<Arc<dyn EventBridge>>) -> Result<DefaultContextFactory> {
    let handlers = CredentialHandlerRegistry::with_defaults(PasswordHashing::default())?;
    let factory = DefaultContextFactory::new(handlers);
    Ok(match event_bridge {
        Some(bridge) => factory.with_event_bridge(bridge),
        None => factory,
    })
}

/// Bootstrap a partition manager with the configuration.
pub async fn bootstrap(
    configuration: IdmConfiguration,
    event_bridge: Option<Arc<dyn EventBridge>>,
) -> Result<PartitionManager> {
    let pm = PartitionManager::new();
    pm.bootstrap(configuration, Arc::new(context_factory(event_bridge)?))
        .await?;
    Ok(pm)
}

/// Partition manager over a single in-memory file store.
pub async fn get_file_manager() -> Result<PartitionManager> {
    bootstrap(
        IdentityConfigurationBuilder::new()
            .named(
                "default",
                [StoreConfiguration::file(FileStoreConfiguration::default())],
            )
            .build()?,
        None,
    )
    .await
}

/// Prepare the isolated Database
///
/// Based on the `DATABASE_URL` environment variable prepare the database for the tests:
///
/// - `postgres` - create a unique schema
/// - `mysql` - create a unique database on the instance
/// - other - use whatever passed.
///
/// By default (when `DATABASE_URL` var is unset) use inmemory sqlite. The
/// schema is created by the store setup.
pub async fn get_isolated_database() -> Result<DatabaseConnection> {
    let db_conn = std::env::var("DATABASE_URL").unwrap_or("sqlite::memory:".to_string());
    let opts: ConnectOptions = ConnectOptions::new(&db_conn).sqlx_logging(false).to_owned();
    let root_db = Database::connect(opts)
        .await
        .wrap_err_with(|| format!("Failed to connect to database at {}", db_conn.clone()))?;
    let isolated_db_url = if db_conn.starts_with("postgres") {
        let schema_name = format!("test_schema_{}", Uuid::new_v4().simple());
        root_db
            .execute_unprepared(&format!("CREATE SCHEMA \"{}\"", schema_name))
            .await
            .wrap_err("Failed to create schema")?;
        // Postgres uses 'search_path' to resolve table names
        if db_conn.contains('?') {
            format!("{}&options=-c%20search_path%3D{}", db_conn, schema_name)
        } else {
            format!("{}?options=-c%20search_path%3D{}", db_conn, schema_name)
        }
    } else if db_conn.starts_with("mysql") {
        let db_name = format!("test_db_{}", Uuid::new_v4().simple());
        root_db
            .execute_unprepared(&format!("CREATE DATABASE `{}`", db_name))
            .await
            .wrap_err("Failed to create database")?;
        format!("{}/{}", db_conn.trim_end_matches('/'), db_name)
    } else {
        // In-memory sqlite is already private to the connection.
        return Ok(root_db);
    };
    let opts = ConnectOptions::new(&isolated_db_url)
        .sqlx_logging(false)
        .to_owned();
    Database::connect(opts).await.wrap_err_with(|| {
        format!(
            "Failed to connect to database at {}",
            isolated_db_url.clone()
        )
    })
}

/// Partition manager over a single SQL store.
pub async fn get_sql_manager() -> Result<PartitionManager> {
    let db = get_isolated_database().await?;
    bootstrap(
        IdentityConfigurationBuilder::new()
            .named("default", [StoreConfiguration::sql(db)])
            .build()?,
        None,
    )
    .await
}
