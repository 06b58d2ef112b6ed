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

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::IdentityManagementError;
use crate::store::PartitionStore;
use crate::store::file::FileIdentityStore;
use crate::types::{Partition, PartitionKind};

#[async_trait]
impl PartitionStore for FileIdentityStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn add_partition(
        &self,
        mut partition: Partition,
    ) -> Result<Partition, IdentityManagementError> {
        if partition.id.is_empty() {
            partition.id = Uuid::new_v4().simple().to_string();
        }
        let stored = partition.clone();
        self.mutate(move |state| state.insert_partition(stored))
            .await?;
        Ok(partition)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn update_partition(
        &self,
        partition: Partition,
    ) -> Result<Partition, IdentityManagementError> {
        let stored = partition.clone();
        self.mutate(move |state| state.replace_partition(stored))
            .await?;
        Ok(partition)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn remove_partition(&self, partition: &Partition) -> Result<(), IdentityManagementError> {
        self.mutate(|state| state.delete_partition(partition)).await
    }

    async fn lookup_partition(&self, id: &str) -> Result<Option<Partition>, IdentityManagementError> {
        Ok(self.read(|state| state.partitions.get(id).cloned()).await)
    }

    async fn get_partition(
        &self,
        kind: PartitionKind,
        name: &str,
    ) -> Result<Option<Partition>, IdentityManagementError> {
        Ok(self
            .read(|state| state.find_partition(kind, name).cloned())
            .await)
    }

    async fn list_partitions(
        &self,
        kind: Option<PartitionKind>,
    ) -> Result<Vec<Partition>, IdentityManagementError> {
        let mut partitions: Vec<Partition> = self
            .read(|state| {
                state
                    .partitions
                    .values()
                    .filter(|p| kind.is_none_or(|kind| p.kind == kind))
                    .cloned()
                    .collect()
            })
            .await;
        partitions.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(partitions)
    }

    async fn count_children(&self, id: &str) -> Result<u64, IdentityManagementError> {
        Ok(self.read(|state| state.count_children(id)).await)
    }
}
