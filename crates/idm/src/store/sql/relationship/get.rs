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

use crate::db::entity::prelude::{
    Relationship as DbRelationship, RelationshipIdentity as DbRelationshipIdentity,
};
use crate::error::{DbContextExt, IdentityManagementError};
use crate::types::Relationship;

#[tracing::instrument(skip_all)]
pub async fn get<C: ConnectionTrait, S: AsRef<str>>(
    db: &C,
    id: S,
) -> Result<Option<Relationship>, IdentityManagementError> {
    DbRelationship::find_by_id(id.as_ref())
        .find_with_related(DbRelationshipIdentity)
        .all(db)
        .await
        .context("fetching relationship")?
        .into_iter()
        .next()
        .map(TryInto::try_into)
        .transpose()
}
