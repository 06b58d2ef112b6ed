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

use async_trait::async_trait;

use crate::error::IdentityManagementError;
use crate::event::IdmEvent;
use crate::query::{RelationshipQuery, matcher};
use crate::store::file::FileIdentityStore;
use crate::store::{InvocationContext, RelationshipStore};
use crate::types::Relationship;

#[async_trait]
impl RelationshipStore for FileIdentityStore {
    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn add_relationship(
        &self,
        ctx: &InvocationContext,
        mut relationship: Relationship,
    ) -> Result<Relationship, IdentityManagementError> {
        if relationship.id.is_empty() {
            relationship.id = ctx.generate_id();
        }
        let stored = relationship.clone();
        self.mutate(move |state| {
            state.insert_relationship(stored);
            Ok(())
        })
        .await?;
        ctx.raise_event(IdmEvent::RelationshipCreated(relationship.clone()));
        Ok(relationship)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn update_relationship(
        &self,
        ctx: &InvocationContext,
        relationship: Relationship,
    ) -> Result<Relationship, IdentityManagementError> {
        let stored = relationship.clone();
        self.mutate(move |state| state.replace_relationship(stored))
            .await?;
        ctx.raise_event(IdmEvent::RelationshipUpdated(relationship.clone()));
        Ok(relationship)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn remove_relationship(
        &self,
        ctx: &InvocationContext,
        relationship: &Relationship,
    ) -> Result<(), IdentityManagementError> {
        self.mutate(|state| state.delete_relationship(relationship))
            .await?;
        ctx.raise_event(IdmEvent::RelationshipDeleted(relationship.clone()));
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn get_relationship(
        &self,
        _ctx: &InvocationContext,
        id: &str,
    ) -> Result<Option<Relationship>, IdentityManagementError> {
        Ok(self
            .read(|state| state.relationships.get(id).cloned())
            .await)
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn query_relationships(
        &self,
        _ctx: &InvocationContext,
        query: &RelationshipQuery,
    ) -> Result<Vec<Relationship>, IdentityManagementError> {
        Ok(self
            .read(|state| matcher::select_relationships(query, state.relationships.values()))
            .await)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn remove_relationships_for_identity(
        &self,
        ctx: &InvocationContext,
        identity_id: &str,
    ) -> Result<u64, IdentityManagementError> {
        let removed = self
            .mutate(|state| Ok(state.delete_relationships_for(identity_id)))
            .await?;
        let count = removed.len() as u64;
        for relationship in removed {
            ctx.raise_event(IdmEvent::RelationshipDeleted(relationship));
        }
        Ok(count)
    }
}
