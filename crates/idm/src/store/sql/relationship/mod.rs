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
//! Relationship table operations.
//!
//! A relationship is stored as a `relationship` row plus one
//! `relationship_identity` row per identity slot.
use std::collections::BTreeMap;

use crate::db::entity::{relationship, relationship_identity};
use crate::error::IdentityManagementError;
use crate::types::Relationship;

mod create;
mod delete;
mod get;
mod list;
mod update;

pub use create::create;
pub use delete::{delete, delete_for_identity};
pub use get::get;
pub use list::{count_in_partition, list};
pub use update::update;

impl TryFrom<(relationship::Model, Vec<relationship_identity::Model>)> for Relationship {
    type Error = IdentityManagementError;

    fn try_from(
        value: (relationship::Model, Vec<relationship_identity::Model>),
    ) -> Result<Self, Self::Error> {
        let (row, identities) = value;
        Ok(Self {
            id: row.id,
            partition_id: row.partition_id,
            kind: row.kind.into(),
            identities: identities
                .into_iter()
                .map(|x| (x.descriptor, x.identity_id))
                .collect::<BTreeMap<_, _>>(),
            attributes: row
                .attributes
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

fn attributes_json(
    relationship: &Relationship,
) -> Result<Option<serde_json::Value>, IdentityManagementError> {
    Ok(if relationship.attributes.is_empty() {
        None
    } else {
        Some(serde_json::to_value(&relationship.attributes)?)
    })
}
