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

use crate::config::common::csv;

/// Identity management configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct IdentitySection {
    /// Store driver serving the default configuration: `file`, `sql` or the
    /// name of a store registered in the plugin manager.
    #[serde(default = "default_file_driver")]
    pub driver: String,

    /// Name of the realm used when no partition is requested.
    #[serde(default = "default_realm")]
    pub default_realm: String,

    /// Credential handlers to enable (`password`, `totp`, `digest`, `x509`).
    /// All built-in handlers when empty.
    #[serde(default, deserialize_with = "csv")]
    pub credential_handlers: Vec<String>,

    #[serde(default)]
    pub password_hashing_algorithm: PasswordHashingAlgo,

    /// Passwords longer than this are truncated before hashing.
    #[serde(default = "default_max_password_length")]
    pub max_password_length: usize,

    /// Bcrypt cost. 12 when unset.
    #[serde(default)]
    pub password_hash_rounds: Option<usize>,

    /// Number of days a new password stays valid when no explicit expiry is
    /// given. Passwords never expire when unset.
    #[serde(default)]
    pub password_expires_days: Option<u64>,
}

impl Default for IdentitySection {
    fn default() -> Self {
        Self {
            driver: default_file_driver(),
            default_realm: default_realm(),
            credential_handlers: Vec::new(),
            password_hashing_algorithm: PasswordHashingAlgo::Bcrypt,
            max_password_length: default_max_password_length(),
            password_hash_rounds: None,
            password_expires_days: None,
        }
    }
}

#[derive(Debug, Default, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum PasswordHashingAlgo {
    #[default]
    #[serde(alias = "bcrypt")]
    Bcrypt,
}

fn default_file_driver() -> String {
    "file".into()
}

fn default_realm() -> String {
    crate::types::DEFAULT_REALM.into()
}

fn default_max_password_length() -> usize {
    4096
}
