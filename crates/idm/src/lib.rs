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
//! # Identity management engine
//!
//! Partitioned identity management with pluggable storage.
//!
//! Identities ([`types::IdentityType`]) and relationships
//! ([`types::Relationship`]) live in partitions ([`types::Partition`]). A
//! partition is either a `Realm` (top level tenant) or a `Tier` (nested
//! scope with an optional parent tier). Callers obtain an
//! [`manager::IdentityManager`] bound to a partition from the
//! [`manager::PartitionManager`], which resolves the store responsible for
//! every operation through the per store [`feature::FeatureSet`].
//!
//! Credentials are validated and updated by [`credential::CredentialHandler`]
//! implementations registered per credential type.

pub mod authentication;
pub mod config;
pub mod credential;
pub mod db;
pub mod db_migration;
pub mod error;
pub mod event;
pub mod feature;
pub mod manager;
pub mod plugin_manager;
pub mod query;
pub mod store;
pub mod types;

pub use error::{IdentityManagementError, SecurityConfigurationError};
pub use manager::{IdentityManager, PartitionManager};
