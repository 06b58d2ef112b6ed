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
//! Identity type table operations.
use sea_orm::entity::*;

use crate::db::entity::identity_type;
use crate::error::{DatabaseError, IdentityManagementError};
use crate::types::IdentityType;

mod create;
mod delete;
mod get;
mod list;
mod update;

pub use create::create;
pub use delete::delete;
pub use get::get;
pub use list::{count_in_partition, list};
pub use update::update;

impl TryFrom<identity_type::Model> for IdentityType {
    type Error = IdentityManagementError;

    fn try_from(value: identity_type::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            partition_id: value.partition_id,
            kind: serde_json::from_value(value.kind)?,
            enabled: value.enabled,
            created_at: value.created_at,
            expires_at: value.expires_at,
            attributes: value
                .attributes
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

fn to_active_model(
    identity: &IdentityType,
) -> Result<identity_type::ActiveModel, IdentityManagementError> {
    Ok(identity_type::ActiveModel {
        id: Set(identity.id.clone()),
        partition_id: Set(identity.partition_id.clone()),
        type_name: Set(identity.type_name().to_string()),
        key_space: Set(identity.kind.key_space().to_string()),
        natural_key: Set(identity.kind.natural_key().map(Into::into)),
        enabled: Set(identity.enabled),
        created_at: Set(identity.created_at),
        expires_at: Set(identity.expires_at),
        kind: Set(serde_json::to_value(&identity.kind)?),
        attributes: Set(if identity.attributes.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&identity.attributes)?)
        }),
    })
}

/// Translate a unique constraint violation into the duplicate error.
fn conflict_to_duplicate(err: DatabaseError, identity: &IdentityType) -> IdentityManagementError {
    match err {
        DatabaseError::Conflict { .. } => IdentityManagementError::IdentityTypeAlreadyExists {
            type_name: identity.type_name().to_string(),
            key: identity
                .kind
                .natural_key()
                .unwrap_or(&identity.id)
                .to_string(),
            partition: identity.partition_id.clone(),
        },
        other => other.into(),
    }
}
