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

use crate::db::entity::{identity_type, prelude::IdentityType as DbIdentityType};
use crate::error::{DbContextExt, IdentityManagementError};
use crate::query::{IdentityParameter, IdentityQuery, QueryValue, matcher};
use crate::types::{IdentityType, IdentityTypeFilter};

fn string_values(query: &IdentityQuery, parameter: &IdentityParameter) -> Option<Vec<String>> {
    query.parameter(parameter).map(|values| {
        values
            .iter()
            .filter_map(QueryValue::as_str)
            .map(String::from)
            .collect()
    })
}

/// List identity types matching the query.
///
/// The partition scope, type, id and natural key predicates are evaluated by
/// the database, the remaining ones in memory.
#[tracing::instrument(skip_all)]
pub async fn list<C: ConnectionTrait>(
    db: &C,
    query: &IdentityQuery,
) -> Result<Vec<IdentityType>, IdentityManagementError> {
    let mut select = DbIdentityType::find();
    if !query.scope().is_empty() {
        select = select.filter(identity_type::Column::PartitionId.is_in(query.scope().iter().cloned()));
    }
    select = match query.filter() {
        IdentityTypeFilter::Any => select,
        IdentityTypeFilter::Agent => select.filter(identity_type::Column::KeySpace.eq("agent")),
        other => select.filter(identity_type::Column::TypeName.eq(other.name())),
    };
    if let Some(ids) = query.id_constraint() {
        select = select.filter(identity_type::Column::Id.is_in(ids.iter().cloned()));
    }
    if let Some(ids) = string_values(query, &IdentityParameter::Id) {
        select = select.filter(identity_type::Column::Id.is_in(ids));
    }
    for parameter in [
        IdentityParameter::LoginName,
        IdentityParameter::Name,
        IdentityParameter::Path,
    ] {
        if let Some(keys) = string_values(query, &parameter) {
            select = select.filter(identity_type::Column::NaturalKey.is_in(keys));
        }
    }
    if let Some(enabled) = query
        .parameter(&IdentityParameter::Enabled)
        .and_then(|values| match values {
            [QueryValue::Boolean(val)] => Some(*val),
            _ => None,
        })
    {
        select = select.filter(identity_type::Column::Enabled.eq(enabled));
    }

    let rows = select
        .order_by_asc(identity_type::Column::Id)
        .all(db)
        .await
        .context("listing identity types")?;
    let identities = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<IdentityType>, _>>()?;
    Ok(matcher::select_identities(query, identities.iter()))
}

/// Number of identity types owned by the partition.
pub async fn count_in_partition<C: ConnectionTrait>(
    db: &C,
    partition_id: &str,
) -> Result<u64, IdentityManagementError> {
    Ok(DbIdentityType::find()
        .filter(identity_type::Column::PartitionId.eq(partition_id))
        .count(db)
        .await
        .context("counting identity types of the partition")?)
}
