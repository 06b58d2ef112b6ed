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
//! # Configuration
//!
//! The configuration file uses the INI format:
//!
//! ```ini
//! [identity]
//! driver = file
//! default_realm = default
//!
//! [file_store]
//! working_dir = /var/lib/idm
//! async_write = true
//!
//! [database]
//! connection = sqlite:///var/lib/idm/idm.db
//! ```
use std::path::PathBuf;

use config::{File, FileFormat};
use eyre::{Report, WrapErr};
use serde::Deserialize;

mod cache;
mod common;
mod database;
mod file_store;
mod identity;

pub use cache::CacheSection;
pub use common::csv;
pub use database::DatabaseSection;
pub use file_store::FileStoreSection;
pub use identity::{IdentitySection, PasswordHashingAlgo};

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    /// Identity cache configuration.
    #[serde(default)]
    pub cache: CacheSection,

    /// Database configuration (`sql` driver).
    #[serde(default)]
    pub database: DatabaseSection,

    /// File store configuration (`file` driver).
    #[serde(default)]
    pub file_store: FileStoreSection,

    /// Identity management configuration.
    #[serde(default)]
    pub identity: IdentitySection,
}

impl Config {
    pub fn new(path: PathBuf) -> Result<Self, Report> {
        let mut builder = config::Config::builder();
        if std::path::Path::new(&path).is_file() {
            builder = builder.add_source(File::from(path).format(FileFormat::Ini));
        }
        builder.try_into()
    }
}

impl TryFrom<config::ConfigBuilder<config::builder::DefaultState>> for Config {
    type Error = Report;
    fn try_from(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, Self::Error> {
        let mut builder = builder;
        builder = builder
            .set_default("identity.driver", "file")?
            .set_default("identity.default_realm", crate::types::DEFAULT_REALM)?
            .set_default("identity.max_password_length", "4096")?
            .set_default("cache.enabled", "true")?
            .set_default("cache.capacity", "10000")?
            .set_default("file_store.always_create_files", "false")?
            .set_default("file_store.async_write", "false")?
            .set_default("file_store.async_write_thread_pool", "4")?;
        builder
            .build()
            .wrap_err("Failed to read configuration file")?
            .try_deserialize()
            .wrap_err("Failed to parse configuration file")
    }
}
