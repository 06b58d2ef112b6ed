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

use sea_orm::entity::*;
use sea_orm::{DatabaseConnection, TransactionTrait};

use super::attributes_json;
use crate::db::entity::prelude::RelationshipIdentity as DbRelationshipIdentity;
use crate::db::entity::{relationship, relationship_identity};
use crate::error::{DbContextExt, IdentityManagementError};
use crate::types::Relationship;

/// Insert the relationship with its identity references.
#[tracing::instrument(skip_all)]
pub async fn create(
    db: &DatabaseConnection,
    rel: &Relationship,
) -> Result<(), IdentityManagementError> {
    let txn = db
        .begin()
        .await
        .context("starting transaction for persisting relationship")?;
    relationship::ActiveModel {
        id: Set(rel.id.clone()),
        partition_id: Set(rel.partition_id.clone()),
        kind: Set(rel.kind.type_name().to_string()),
        attributes: Set(attributes_json(rel)?),
    }
    .insert(&txn)
    .await
    .context("inserting relationship")?;

    DbRelationshipIdentity::insert_many(rel.identities.iter().map(|(descriptor, identity_id)| {
        relationship_identity::ActiveModel {
            relationship_id: Set(rel.id.clone()),
            descriptor: Set(descriptor.clone()),
            identity_id: Set(identity_id.clone()),
        }
    }))
    .on_empty_do_nothing()
    .exec(&txn)
    .await
    .context("inserting relationship identities")?;

    txn.commit()
        .await
        .context("committing the relationship creation")?;
    Ok(())
}
