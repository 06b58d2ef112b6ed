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
use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::db::entity::{credential, prelude::Credential as DbCredential};
use crate::db::entity::prelude::IdentityType as DbIdentityType;
use crate::error::{DbContextExt, IdentityManagementError};
use crate::store::sql::relationship;
use crate::types::{IdentityType, Relationship};

/// Remove the identity type, the relationships referencing it and its
/// credentials in one transaction.
///
/// Returns the removed relationships.
#[tracing::instrument(skip_all)]
pub async fn delete(
    db: &DatabaseConnection,
    identity: &IdentityType,
) -> Result<Vec<Relationship>, IdentityManagementError> {
    let txn = db
        .begin()
        .await
        .context("starting transaction for removing identity type")?;

    let relationships = relationship::delete_for_identity(&txn, &identity.id).await?;
    DbCredential::delete_many()
        .filter(credential::Column::IdentityId.eq(&identity.id))
        .exec(&txn)
        .await
        .context("removing identity type credentials")?;
    let res = DbIdentityType::delete_by_id(&identity.id)
        .exec(&txn)
        .await
        .context("removing identity type record")?;
    if res.rows_affected != 1 {
        // Dropping the transaction rolls it back.
        return Err(IdentityManagementError::IdentityTypeNotFound {
            id: identity.id.clone(),
            partition: identity.partition_id.clone(),
        });
    }

    txn.commit()
        .await
        .context("committing the identity type removal")?;
    Ok(relationships)
}
