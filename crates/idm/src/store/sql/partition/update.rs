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

use super::to_active_model;
use crate::db::entity::prelude::Partition as DbPartition;
use crate::error::{DatabaseError, DbContextExt, IdentityManagementError};
use crate::types::Partition;

#[tracing::instrument(skip_all)]
pub async fn update<C: ConnectionTrait>(
    db: &C,
    partition: &Partition,
) -> Result<(), IdentityManagementError> {
    if DbPartition::find_by_id(&partition.id)
        .one(db)
        .await
        .context("searching for the existing partition")?
        .is_none()
    {
        return Err(IdentityManagementError::PartitionNotFound(
            partition.name.clone(),
        ));
    }
    to_active_model(partition)?
        .update(db)
        .await
        .context("updating partition")
        .map_err(|e| match e {
            DatabaseError::Conflict { .. } => IdentityManagementError::PartitionAlreadyExists {
                kind: partition.kind.to_string(),
                name: partition.name.clone(),
            },
            other => other.into(),
        })?;
    Ok(())
}
