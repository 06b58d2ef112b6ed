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
//! Credential table operations.
use sea_orm::entity::*;
use sea_orm::query::*;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};

use crate::credential::CredentialStorage;
use crate::db::entity::{credential, prelude::Credential as DbCredential};
use crate::error::{DbContextExt, IdentityManagementError};

impl TryFrom<credential::Model> for CredentialStorage {
    type Error = IdentityManagementError;

    fn try_from(value: credential::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            identity_id: value.identity_id,
            storage_type: value.storage_type,
            effective_date: value.effective_date,
            expiry_date: value.expiry_date,
            fields: serde_json::from_value(value.fields)?,
        })
    }
}

/// Append the record to the history of the identity.
#[tracing::instrument(skip_all)]
pub async fn create(
    db: &DatabaseConnection,
    storage: &CredentialStorage,
) -> Result<(), IdentityManagementError> {
    let txn = db
        .begin()
        .await
        .context("starting transaction for persisting credential")?;
    let seq = DbCredential::find()
        .filter(credential::Column::IdentityId.eq(&storage.identity_id))
        .count(&txn)
        .await
        .context("counting identity credentials")?;
    credential::ActiveModel {
        id: Set(storage.id.clone()),
        identity_id: Set(storage.identity_id.clone()),
        storage_type: Set(storage.storage_type.clone()),
        effective_date: Set(storage.effective_date),
        expiry_date: Set(storage.expiry_date),
        fields: Set(serde_json::to_value(&storage.fields)?),
        seq: Set(seq as i64),
    }
    .insert(&txn)
    .await
    .context("inserting credential")?;
    txn.commit()
        .await
        .context("committing the credential creation")?;
    Ok(())
}

/// Records of the type, oldest first.
#[tracing::instrument(skip_all)]
pub async fn list<C: ConnectionTrait>(
    db: &C,
    identity_id: &str,
    storage_type: &str,
) -> Result<Vec<CredentialStorage>, IdentityManagementError> {
    DbCredential::find()
        .filter(credential::Column::IdentityId.eq(identity_id))
        .filter(credential::Column::StorageType.eq(storage_type))
        .order_by_asc(credential::Column::EffectiveDate)
        .order_by_asc(credential::Column::Seq)
        .all(db)
        .await
        .context("listing identity credentials")?
        .into_iter()
        .map(TryInto::try_into)
        .collect()
}

/// Remove all records of the identity.
#[tracing::instrument(skip_all)]
pub async fn delete<C: ConnectionTrait>(
    db: &C,
    identity_id: &str,
) -> Result<u64, IdentityManagementError> {
    Ok(DbCredential::delete_many()
        .filter(credential::Column::IdentityId.eq(identity_id))
        .exec(db)
        .await
        .context("removing identity credentials")?
        .rows_affected)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_list() {
        let now = Utc::now();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![credential::Model {
                id: "c1".into(),
                identity_id: "u".into(),
                storage_type: "password".into(),
                effective_date: now,
                expiry_date: None,
                fields: json!({"encoded_hash": "h", "salt": "s"}),
                seq: 0,
            }]])
            .into_connection();
        assert_eq!(
            vec![CredentialStorage {
                id: "c1".into(),
                identity_id: "u".into(),
                storage_type: "password".into(),
                effective_date: now,
                expiry_date: None,
                fields: BTreeMap::from([
                    ("encoded_hash".into(), "h".into()),
                    ("salt".into(), "s".into())
                ]),
            }],
            list(&db, "u", "password").await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_delete() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                rows_affected: 3,
                ..Default::default()
            }])
            .into_connection();
        assert_eq!(3, delete(&db, "u").await.unwrap());
    }
}
