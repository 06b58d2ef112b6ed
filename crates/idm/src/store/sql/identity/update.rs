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

use super::{conflict_to_duplicate, to_active_model};
use crate::db::entity::prelude::IdentityType as DbIdentityType;
use crate::error::{DbContextExt, IdentityManagementError};
use crate::types::IdentityType;

/// Replace the stored identity type.
#[tracing::instrument(skip_all)]
pub async fn update<C: ConnectionTrait>(
    db: &C,
    identity: &IdentityType,
) -> Result<(), IdentityManagementError> {
    if DbIdentityType::find_by_id(&identity.id)
        .one(db)
        .await
        .context("searching for the existing identity type")?
        .is_none()
    {
        return Err(IdentityManagementError::IdentityTypeNotFound {
            id: identity.id.clone(),
            partition: identity.partition_id.clone(),
        });
    }
    to_active_model(identity)?
        .update(db)
        .await
        .context("updating identity type")
        .map_err(|e| conflict_to_duplicate(e, identity))?;
    Ok(())
}
