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

use serde::Deserialize;

use crate::config::common::default_true;

/// Second level identity cache configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct CacheSection {
    /// Whether the identity cache is used.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximal number of cached identity types.
    #[serde(default = "default_capacity")]
    pub capacity: u64,

    /// Time to live of the entries in seconds.
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
            ttl: None,
        }
    }
}

fn default_capacity() -> u64 {
    10000
}
