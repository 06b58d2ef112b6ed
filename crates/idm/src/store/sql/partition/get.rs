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

#[tracing::instrument(skip_all)]
pub async fn get<C: ConnectionTrait, S: AsRef<str>>(
    db: &C,
    id: S,
) -> Result<Option<Partition>, IdentityManagementError> {
    DbPartition::find_by_id(id.as_ref())
        .one(db)
        .await
        .context("fetching partition")?
        .map(TryInto::try_into)
        .transpose()
}

#[tracing::instrument(skip_all)]
pub async fn get_by_name<C: ConnectionTrait>(
    db: &C,
    kind: PartitionKind,
    name: &str,
) -> Result<Option<Partition>, IdentityManagementError> {
    DbPartition::find()
        .filter(partition::Column::Kind.eq(kind.as_str()))
        .filter(partition::Column::Name.eq(name))
        .one(db)
        .await
        .context("fetching partition by name")?
        .map(TryInto::try_into)
        .transpose()
}
