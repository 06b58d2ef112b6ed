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

use super::attributes_json;
use crate::db::entity::prelude::Relationship as DbRelationship;
use crate::db::entity::relationship;
use crate::error::{DbContextExt, IdentityManagementError};
use crate::types::Relationship;

/// Replace the attributes of the relationship. Identity slots never change.
#[tracing::instrument(skip_all)]
pub async fn update<C: ConnectionTrait>(
    db: &C,
    rel: &Relationship,
) -> Result<(), IdentityManagementError> {
    let Some(current) = DbRelationship::find_by_id(&rel.id)
        .one(db)
        .await
        .context("searching for the existing relationship")?
    else {
        return Err(IdentityManagementError::RelationshipNotFound {
            id: rel.id.clone(),
            partition: rel.partition_id.clone(),
        });
    };
    let mut entry: relationship::ActiveModel = current.into();
    entry.attributes = Set(attributes_json(rel)?);
    entry
        .update(db)
        .await
        .context("updating relationship")?;
    Ok(())
}
