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
use sea_orm::query::*;
use sea_orm::sea_query::Query;

use crate::db::entity::prelude::{
    Relationship as DbRelationship, RelationshipIdentity as DbRelationshipIdentity,
};
use crate::db::entity::{relationship, relationship_identity};
use crate::error::{DbContextExt, IdentityManagementError};
use crate::query::{RelationshipParameter, RelationshipQuery, matcher};
use crate::types::Relationship;

/// List relationships matching the query.
///
/// Partition scope, kind, id and identity reference predicates are evaluated
/// by the database, attributes in memory.
#[tracing::instrument(skip_all)]
pub async fn list<C: ConnectionTrait>(
    db: &C,
    query: &RelationshipQuery,
) -> Result<Vec<Relationship>, IdentityManagementError> {
    let mut select = DbRelationship::find();
    if !query.scope().is_empty() {
        select = select.filter(relationship::Column::PartitionId.is_in(query.scope().iter().cloned()));
    }
    if let Some(kind) = query.kind() {
        select = select.filter(relationship::Column::Kind.eq(kind.type_name()));
    }
    for (parameter, values) in query.parameters() {
        let ids: Vec<String> = values
            .iter()
            .filter_map(|val| val.identity_id().map(String::from))
            .collect();
        match parameter {
            RelationshipParameter::Id => {
                select = select.filter(relationship::Column::Id.is_in(ids));
            }
            RelationshipParameter::Identity | RelationshipParameter::Slot(_) => {
                let mut references = Query::select()
                    .column(relationship_identity::Column::RelationshipId)
                    .from(relationship_identity::Entity.table_ref())
                    .and_where(relationship_identity::Column::IdentityId.is_in(ids))
                    .to_owned();
                if let RelationshipParameter::Slot(slot) = parameter {
                    references.and_where(relationship_identity::Column::Descriptor.eq(slot.as_str()));
                }
                select = select.filter(relationship::Column::Id.in_subquery(references));
            }
            RelationshipParameter::Attribute(_) => {}
        }
    }

    let rows = select
        .order_by_asc(relationship::Column::Id)
        .find_with_related(DbRelationshipIdentity)
        .all(db)
        .await
        .context("listing relationships")?;
    let relationships = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<Relationship>, _>>()?;
    Ok(matcher::select_relationships(query, relationships.iter()))
}

/// Number of relationships created in the partition.
pub async fn count_in_partition<C: ConnectionTrait>(
    db: &C,
    partition_id: &str,
) -> Result<u64, IdentityManagementError> {
    Ok(DbRelationship::find()
        .filter(relationship::Column::PartitionId.eq(partition_id))
        .count(db)
        .await
        .context("counting relationships of the partition")?)
}
