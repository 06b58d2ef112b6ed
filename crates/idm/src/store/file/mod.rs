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
//! # File identity store
//!
//! Keeps the complete data set in memory and optionally persists it as a JSON
//! snapshot in a working directory. Every mutation is applied to a copy of the
//! data which is persisted before it replaces the current state, so a failed
//! mutation leaves nothing behind.
use std::path::PathBuf;

use derive_builder::Builder;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::FileStoreSection;
use crate::error::{BuilderError, IdentityManagementError};

mod credential;
mod identity;
mod partition;
mod persist;
mod relationship;
pub(crate) mod state;

use persist::FilePersistence;
use state::FileState;

/// File store settings.
#[derive(Builder, Clone, Debug, Default, PartialEq)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct FileStoreConfiguration {
    /// Directory of the data files. Data is kept in memory only when unset.
    #[builder(default)]
    pub working_dir: Option<PathBuf>,

    /// Discard the existing data files on setup.
    #[builder(default)]
    pub always_create_files: bool,

    /// Persist in background tasks.
    #[builder(default)]
    pub async_write: bool,

    /// Maximal number of concurrent background writes.
    #[builder(default = "4")]
    pub async_write_pool: usize,
}

impl From<&FileStoreSection> for FileStoreConfiguration {
    fn from(value: &FileStoreSection) -> Self {
        Self {
            working_dir: value.working_dir.clone(),
            always_create_files: value.always_create_files,
            async_write: value.async_write,
            async_write_pool: value.async_write_thread_pool,
        }
    }
}

/// Store backed by in-memory maps and JSON files.
#[derive(Debug)]
pub struct FileIdentityStore {
    config: FileStoreConfiguration,
    state: RwLock<FileState>,
    persistence: Option<FilePersistence>,
}

impl FileIdentityStore {
    pub fn new(config: FileStoreConfiguration) -> Self {
        let persistence = config.working_dir.clone().map(|dir| {
            FilePersistence::new(dir, config.async_write, config.async_write_pool)
        });
        Self {
            config,
            state: RwLock::new(FileState::default()),
            persistence,
        }
    }

    /// Store keeping the data in memory only.
    pub fn in_memory() -> Self {
        Self::new(FileStoreConfiguration::default())
    }

    pub fn configuration(&self) -> &FileStoreConfiguration {
        &self.config
    }

    /// Load the data files.
    pub(crate) async fn load(&self) -> Result<(), IdentityManagementError> {
        if let Some(persistence) = &self.persistence {
            debug!(
                "file identity store loading {:?}",
                self.config.working_dir
            );
            let loaded = persistence.init(self.config.always_create_files).await?;
            *self.state.write().await = loaded;
        }
        Ok(())
    }

    /// Wait until the background writes completed.
    pub async fn flush(&self) {
        if let Some(persistence) = &self.persistence {
            persistence.flush().await;
        }
    }

    /// Apply the mutation on a copy of the state, persist it and make it
    /// current. The state stays untouched when any step fails.
    pub(crate) async fn mutate<T, F>(&self, f: F) -> Result<T, IdentityManagementError>
    where
        F: FnOnce(&mut FileState) -> Result<T, IdentityManagementError>,
    {
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let res = f(&mut next)?;
        if let Some(persistence) = &self.persistence {
            persistence.persist(&next).await?;
        }
        *guard = next;
        Ok(res)
    }

    pub(crate) async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&FileState) -> T,
    {
        f(&*self.state.read().await)
    }
}

impl Default for FileIdentityStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
