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
use crate::error::{DatabaseError, DbContextExt, IdentityManagementError};
use crate::types::Partition;

#[tracing::instrument(skip_all)]
pub async fn create<C: ConnectionTrait>(
    db: &C,
    partition: &Partition,
) -> Result<(), IdentityManagementError> {
    to_active_model(partition)?
        .insert(db)
        .await
        .context("persisting partition")
        .map_err(|e| match e {
            DatabaseError::Conflict { .. } => IdentityManagementError::PartitionAlreadyExists {
                kind: partition.kind.to_string(),
                name: partition.name.clone(),
            },
            other => other.into(),
        })?;
    Ok(())
}
