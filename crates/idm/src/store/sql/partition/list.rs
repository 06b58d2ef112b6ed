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

use sea_orm::ConnectionTrait;
use sea_orm::entity::*;
use sea_orm::query::*;

use crate::db::entity::{partition, prelude::Partition as DbPartition};
use crate::error::{DbContextExt, IdentityManagementError};
use crate::types::{Partition, PartitionKind};

/// List partitions ordered by name.
#[tracing::instrument(skip_all)]
pub async fn list<C: ConnectionTrait>(
    db: &C,
    kind: Option<PartitionKind>,
) -> Result<Vec<Partition>, IdentityManagementError> {
    let mut select = DbPartition::find();
    if let Some(kind) = kind {
        select = select.filter(partition::Column::Kind.eq(kind.as_str()));
    }
    select
        .order_by_asc(partition::Column::Name)
        .order_by_asc(partition::Column::Id)
        .all(db)
        .await
        .context("listing partitions")?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
}

/// Number of tiers nested directly under the partition.
pub async fn count_children<C: ConnectionTrait>(
    db: &C,
    id: &str,
) -> Result<u64, IdentityManagementError> {
    Ok(DbPartition::find()
        .filter(partition::Column::ParentId.eq(id))
        .count(db)
        .await
        .context("counting child partitions")?)
}
