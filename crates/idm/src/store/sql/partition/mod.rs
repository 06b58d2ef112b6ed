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
//! Partition table operations.
use std::str::FromStr;

use sea_orm::entity::*;

use crate::db::entity::partition;
use crate::error::IdentityManagementError;
use crate::types::{Partition, PartitionKind};

mod create;
mod delete;
mod get;
mod list;
mod update;

pub use create::create;
pub use delete::delete;
pub use get::{get, get_by_name};
pub use list::{count_children, list};
pub use update::update;

impl TryFrom<partition::Model> for Partition {
    type Error = IdentityManagementError;

    fn try_from(value: partition::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            name: value.name,
            kind: PartitionKind::from_str(&value.kind)?,
            parent_id: value.parent_id,
            configuration_name: value.configuration_name,
            attributes: value
                .attributes
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

fn to_active_model(value: &Partition) -> Result<partition::ActiveModel, IdentityManagementError> {
    Ok(partition::ActiveModel {
        id: Set(value.id.clone()),
        name: Set(value.name.clone()),
        kind: Set(value.kind.as_str().to_string()),
        parent_id: Set(value.parent_id.clone()),
        configuration_name: Set(value.configuration_name.clone()),
        attributes: Set(if value.attributes.is_empty() {
            None
        } else {
            Some(serde_json::to_value(&value.attributes)?)
        }),
    })
}
