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
//! JSON persistence of the file store.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use crate::credential::CredentialStorage;
use crate::error::IdentityManagementError;
use crate::store::file::state::FileState;
use crate::types::{IdentityType, Partition, Relationship};

/// Single data file, so that a write replaces all collections at once.
const DATA_FILE: &str = "identity-store.json";
const TMP_EXTENSION: &str = "json.tmp";

/// Writer of the data file in the working directory.
#[derive(Debug)]
pub struct FilePersistence {
    working_dir: PathBuf,
    async_write: bool,
    pool: Arc<Semaphore>,
    generation: AtomicU64,
    /// Generation of the last completed write.
    written: Arc<Mutex<u64>>,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    partitions: Vec<&'a Partition>,
    identities: Vec<&'a IdentityType>,
    relationships: Vec<&'a Relationship>,
    credentials: Vec<&'a CredentialStorage>,
}

#[derive(Default, Deserialize)]
struct StoredData {
    #[serde(default)]
    partitions: Vec<Partition>,
    #[serde(default)]
    identities: Vec<IdentityType>,
    #[serde(default)]
    relationships: Vec<Relationship>,
    #[serde(default)]
    credentials: Vec<CredentialStorage>,
}

/// Replace the data file through a temporary file.
///
/// The rename is atomic, so the file holds either the previous or the new
/// snapshot, never a mix of both.
async fn write_file(path: &Path, content: &str) -> Result<(), IdentityManagementError> {
    let tmp = path.with_extension(TMP_EXTENSION);
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

impl FilePersistence {
    pub fn new(working_dir: PathBuf, async_write: bool, pool_size: usize) -> Self {
        Self {
            working_dir,
            async_write,
            pool: Arc::new(Semaphore::new(pool_size.max(1))),
            generation: AtomicU64::new(0),
            written: Arc::new(Mutex::new(0)),
        }
    }

    fn data_file(&self) -> PathBuf {
        self.working_dir.join(DATA_FILE)
    }

    /// Prepare the working directory and load the stored data.
    pub async fn init(&self, always_create_files: bool) -> Result<FileState, IdentityManagementError> {
        if always_create_files && fs::try_exists(&self.working_dir).await? {
            debug!("discarding the content of {}", self.working_dir.display());
            fs::remove_dir_all(&self.working_dir).await?;
        }
        fs::create_dir_all(&self.working_dir).await?;
        self.load().await
    }

    pub async fn load(&self) -> Result<FileState, IdentityManagementError> {
        let stored: StoredData = match fs::read(self.data_file()).await {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredData::default(),
            Err(e) => return Err(e.into()),
        };
        let mut state = FileState::default();
        for partition in stored.partitions {
            state.partitions.insert(partition.id.clone(), partition);
        }
        for identity in stored.identities {
            state.identities.insert(identity.id.clone(), identity);
        }
        for relationship in stored.relationships {
            state
                .relationships
                .insert(relationship.id.clone(), relationship);
        }
        for storage in stored.credentials {
            state.append_credential(storage);
        }
        debug!(
            "loaded {} identities and {} relationships from {}",
            state.identities.len(),
            state.relationships.len(),
            self.working_dir.display()
        );
        Ok(state)
    }

    fn snapshot(&self, state: &FileState) -> Result<String, IdentityManagementError> {
        Ok(serde_json::to_string_pretty(&Snapshot {
            partitions: state.partitions.values().collect(),
            identities: state.identities.values().collect(),
            relationships: state.relationships.values().collect(),
            credentials: state.credentials.values().flatten().collect(),
        })?)
    }

    /// Write the state, in a background task when async writes are enabled.
    ///
    /// A background write is skipped when a newer state has already been
    /// written.
    pub async fn persist(&self, state: &FileState) -> Result<(), IdentityManagementError> {
        let content = self.snapshot(state)?;
        let path = self.data_file();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.async_write {
            let mut written = self.written.lock().await;
            write_file(&path, &content).await?;
            *written = generation;
            return Ok(());
        }
        let pool = self.pool.clone();
        let written = self.written.clone();
        tokio::spawn(async move {
            let Ok(_permit) = pool.acquire_owned().await else {
                return;
            };
            let mut written = written.lock().await;
            if *written > generation {
                return;
            }
            match write_file(&path, &content).await {
                Ok(()) => *written = generation,
                Err(e) => warn!("async write of the identity data failed: {e}"),
            }
        });
        Ok(())
    }

    /// Wait for the pending background writes.
    pub async fn flush(&self) {
        let expected = self.generation.load(Ordering::SeqCst);
        loop {
            if *self.written.lock().await >= expected {
                return;
            }
            tokio::task::yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_persist_load() {
        let dir = tempdir().unwrap();
        let sot = FilePersistence::new(dir.path().join("data"), false, 1);
        let mut state = sot.init(false).await.unwrap();
        assert_eq!(FileState::default(), state);

        let mut realm = Partition::realm("acme");
        realm.id = "r".into();
        state.insert_partition(realm).unwrap();
        let mut role = IdentityType::role("admin");
        role.id = "i".into();
        role.partition_id = "r".into();
        state.insert_identity(role).unwrap();
        sot.persist(&state).await.unwrap();

        assert_eq!(state, sot.load().await.unwrap());
        // Recreating the files drops the content.
        assert_eq!(FileState::default(), sot.init(true).await.unwrap());
    }

    #[tokio::test]
    async fn test_async_write() {
        let dir = tempdir().unwrap();
        let sot = FilePersistence::new(dir.path().to_path_buf(), true, 2);
        let mut state = sot.init(false).await.unwrap();
        for idx in 0..5 {
            let mut role = IdentityType::role(format!("role{idx}"));
            role.id = format!("i{idx}");
            role.partition_id = "r".into();
            state.insert_identity(role).unwrap();
            sot.persist(&state).await.unwrap();
        }
        sot.flush().await;
        assert_eq!(5, sot.load().await.unwrap().identities.len());
    }

    #[tokio::test]
    async fn test_interrupted_write_keeps_previous_snapshot() {
        let dir = tempdir().unwrap();
        let sot = FilePersistence::new(dir.path().to_path_buf(), false, 1);
        let mut state = sot.init(false).await.unwrap();
        let mut role = IdentityType::role("admin");
        role.id = "i".into();
        role.partition_id = "r".into();
        state.insert_identity(role).unwrap();
        sot.persist(&state).await.unwrap();
        assert!(!sot.data_file().with_extension(TMP_EXTENSION).exists());

        // A write cut short leaves at most a partial temporary file behind.
        fs::write(sot.data_file().with_extension(TMP_EXTENSION), "{\"identities\": [")
            .await
            .unwrap();
        assert_eq!(state, sot.load().await.unwrap());
        let entries: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.ends_with(".json"))
            .collect();
        assert_eq!(vec![DATA_FILE.to_string()], entries);
    }
}
