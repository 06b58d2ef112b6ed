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

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "credential")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub identity_id: String,
    pub storage_type: String,
    pub effective_date: DateTimeUtc,
    pub expiry_date: Option<DateTimeUtc>,
    pub fields: Json,
    /// Insertion order of records sharing the effective date.
    pub seq: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::identity_type::Entity",
        from = "Column::IdentityId",
        to = "super::identity_type::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    IdentityType,
}

impl Related<super::identity_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IdentityType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
