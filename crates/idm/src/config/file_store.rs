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

use std::path::PathBuf;

use serde::Deserialize;

/// File store configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct FileStoreSection {
    /// Directory holding the data files. The store keeps the data in memory
    /// only when unset.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Recreate the data files on start discarding their content.
    #[serde(default)]
    pub always_create_files: bool,

    /// Persist changes in background tasks.
    #[serde(default)]
    pub async_write: bool,

    /// Maximal number of concurrent background writes.
    #[serde(default = "default_pool")]
    pub async_write_thread_pool: usize,
}

impl Default for FileStoreSection {
    fn default() -> Self {
        Self {
            working_dir: None,
            always_create_files: false,
            async_write: false,
            async_write_thread_pool: default_pool(),
        }
    }
}

fn default_pool() -> usize {
    4
}
