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
//! Second level identity cache.
use std::fmt;
use std::time::Duration;

use moka::sync::Cache;
use tracing::trace;

use crate::config::CacheSection;
use crate::types::IdentityType;

/// Identity types keyed by partition and identity id.
///
/// The cache is advisory: a miss always falls through to the store and the
/// entries are never used to decide whether an identity exists.
#[derive(Clone)]
pub struct IdentityCache {
    entries: Cache<(String, String), IdentityType>,
}

impl IdentityCache {
    pub fn new(capacity: u64, ttl: Option<Duration>) -> Self {
        let mut builder = Cache::builder().max_capacity(capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            entries: builder.build(),
        }
    }

    /// Cache configured by the `[cache]` section, `None` when disabled.
    pub fn from_config(section: &CacheSection) -> Option<Self> {
        section
            .enabled
            .then(|| Self::new(section.capacity, section.ttl.map(Duration::from_secs)))
    }

    pub fn lookup(&self, partition_id: &str, id: &str) -> Option<IdentityType> {
        let res = self
            .entries
            .get(&(partition_id.to_string(), id.to_string()));
        if res.is_none() {
            trace!("identity cache miss for {partition_id}/{id}");
        }
        res
    }

    pub fn put(&self, identity: &IdentityType) {
        self.entries.insert(
            (identity.partition_id.clone(), identity.id.clone()),
            identity.clone(),
        );
    }

    pub fn invalidate(&self, partition_id: &str, id: &str) {
        self.entries
            .invalidate(&(partition_id.to_string(), id.to_string()));
    }
}

impl fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}
