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
use sea_orm::query::*;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};

use crate::db::entity::prelude::{
    Relationship as DbRelationship, RelationshipIdentity as DbRelationshipIdentity,
};
use crate::db::entity::{relationship, relationship_identity};
use crate::error::{DbContextExt, IdentityManagementError};
use crate::types::Relationship;

/// Remove the relationship.
#[tracing::instrument(skip_all)]
pub async fn delete(
    db: &DatabaseConnection,
    rel: &Relationship,
) -> Result<(), IdentityManagementError> {
    let txn = db
        .begin()
        .await
        .context("starting transaction for removing relationship")?;
    DbRelationshipIdentity::delete_many()
        .filter(relationship_identity::Column::RelationshipId.eq(&rel.id))
        .exec(&txn)
        .await
        .context("removing relationship identities")?;
    let res = DbRelationship::delete_by_id(&rel.id)
        .exec(&txn)
        .await
        .context("removing relationship record")?;
    if res.rows_affected != 1 {
        return Err(IdentityManagementError::RelationshipNotFound {
            id: rel.id.clone(),
            partition: rel.partition_id.clone(),
        });
    }
    txn.commit()
        .await
        .context("committing the relationship removal")?;
    Ok(())
}

/// Remove all relationships referencing the identity using the connection
/// or transaction of the caller.
///
/// Returns the removed relationships.
#[tracing::instrument(skip_all)]
pub async fn delete_for_identity<C: ConnectionTrait>(
    db: &C,
    identity_id: &str,
) -> Result<Vec<Relationship>, IdentityManagementError> {
    let referencing: Vec<String> = DbRelationshipIdentity::find()
        .filter(relationship_identity::Column::IdentityId.eq(identity_id))
        .select_only()
        .column(relationship_identity::Column::RelationshipId)
        .distinct()
        .into_tuple()
        .all(db)
        .await
        .context("searching relationships referencing the identity")?;
    if referencing.is_empty() {
        return Ok(Vec::new());
    }

    let removed = DbRelationship::find()
        .filter(relationship::Column::Id.is_in(referencing.clone()))
        .find_with_related(DbRelationshipIdentity)
        .all(db)
        .await
        .context("fetching relationships referencing the identity")?
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<Relationship>, _>>()?;

    DbRelationshipIdentity::delete_many()
        .filter(relationship_identity::Column::RelationshipId.is_in(referencing.clone()))
        .exec(db)
        .await
        .context("removing relationship identities")?;
    DbRelationship::delete_many()
        .filter(relationship::Column::Id.is_in(referencing))
        .exec(db)
        .await
        .context("removing relationships referencing the identity")?;
    Ok(removed)
}
