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
use crate::query::{IdentityQuery, matcher};
use crate::store::file::FileIdentityStore;
use crate::store::{
    CredentialStore, IdentityStore, InvocationContext, PartitionReferences, PartitionStore,
    RelationshipStore,
};
use crate::types::IdentityType;

#[async_trait]
impl IdentityStore for FileIdentityStore {
    fn driver(&self) -> &str {
        "file"
    }

    async fn setup(&self) -> Result<(), IdentityManagementError> {
        self.load().await
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn add_identity(
        &self,
        ctx: &InvocationContext,
        mut identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        if identity.id.is_empty() {
            identity.id = ctx.generate_id();
        }
        let stored = identity.clone();
        self.mutate(move |state| state.insert_identity(stored))
            .await?;
        if let Some(cache) = ctx.cache() {
            cache.put(&identity);
        }
        ctx.raise_event(IdmEvent::IdentityTypeCreated(identity.clone()));
        Ok(identity)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn update_identity(
        &self,
        ctx: &InvocationContext,
        identity: IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        let stored = identity.clone();
        self.mutate(move |state| state.replace_identity(stored))
            .await?;
        if let Some(cache) = ctx.cache() {
            cache.put(&identity);
        }
        ctx.raise_event(IdmEvent::IdentityTypeUpdated(identity.clone()));
        Ok(identity)
    }

    #[tracing::instrument(level = "debug", skip(self, ctx))]
    async fn remove_identity(
        &self,
        ctx: &InvocationContext,
        identity: &IdentityType,
    ) -> Result<(), IdentityManagementError> {
        let removed = self
            .mutate(|state| state.delete_identity(identity))
            .await?;
        if let Some(cache) = ctx.cache() {
            cache.invalidate(&identity.partition_id, &identity.id);
        }
        for relationship in removed {
            ctx.raise_event(IdmEvent::RelationshipDeleted(relationship));
        }
        ctx.raise_event(IdmEvent::IdentityTypeDeleted(identity.clone()));
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn get_identity(
        &self,
        _ctx: &InvocationContext,
        id: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        Ok(self.read(|state| state.identities.get(id).cloned()).await)
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn query_identities(
        &self,
        _ctx: &InvocationContext,
        query: &IdentityQuery,
    ) -> Result<Vec<IdentityType>, IdentityManagementError> {
        Ok(self
            .read(|state| matcher::select_identities(query, state.identities.values()))
            .await)
    }

    async fn partition_references(
        &self,
        partition_id: &str,
    ) -> Result<PartitionReferences, IdentityManagementError> {
        Ok(self
            .read(|state| state.partition_references(partition_id))
            .await)
    }

    fn relationship_store(&self) -> Option<&dyn RelationshipStore> {
        Some(self)
    }

    fn credential_store(&self) -> Option<&dyn CredentialStore> {
        Some(self)
    }

    fn partition_store(&self) -> Option<&dyn PartitionStore> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::credential::CredentialHandlerRegistry;
    use crate::event::MockEventBridge;
    use crate::store::{DefaultContextFactory, IdentityCache, InvocationContextFactory};
    use crate::types::{IdentityTypeFilter, Partition, Relationship};

    fn context(bridge: MockEventBridge, cache: IdentityCache) -> InvocationContext {
        let mut realm = Partition::realm("acme");
        realm.id = "p".into();
        DefaultContextFactory::new(CredentialHandlerRegistry::new())
            .with_event_bridge(Arc::new(bridge))
            .with_cache(cache)
            .create_context(&realm, vec![realm.id.clone()])
    }

    #[tokio::test]
    async fn test_add_writes_cache_and_raises_event() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut bridge = MockEventBridge::new();
        let recorded = events.clone();
        bridge
            .expect_raise_event()
            .returning(move |event| recorded.lock().unwrap().push(event));
        let cache = IdentityCache::new(10, None);
        let ctx = context(bridge, cache.clone());
        let store = FileIdentityStore::in_memory();

        let mut role = IdentityType::role("admin");
        role.partition_id = "p".into();
        let role = store.add_identity(&ctx, role).await.unwrap();
        assert!(!role.id.is_empty());
        assert_eq!(Some(role.clone()), cache.lookup("p", &role.id));

        let query = IdentityQuery::new(IdentityTypeFilter::Role).in_scope(vec!["p".into()]);
        assert_eq!(vec![role.clone()], store.query_identities(&ctx, &query).await.unwrap());

        store.remove_identity(&ctx, &role).await.unwrap();
        assert!(cache.lookup("p", &role.id).is_none());
        assert!(store.get_identity(&ctx, &role.id).await.unwrap().is_none());
        assert_eq!(
            vec![
                IdmEvent::IdentityTypeCreated(role.clone()),
                IdmEvent::IdentityTypeDeleted(role.clone())
            ],
            *events.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn test_remove_cascades_relationships() {
        let mut bridge = MockEventBridge::new();
        bridge.expect_raise_event().return_const(());
        let ctx = context(bridge, IdentityCache::new(10, None));
        let store = FileIdentityStore::in_memory();
        let mut user = IdentityType::user("john");
        user.partition_id = "p".into();
        let user = store.add_identity(&ctx, user).await.unwrap();
        let mut role = IdentityType::role("admin");
        role.partition_id = "p".into();
        let role = store.add_identity(&ctx, role).await.unwrap();
        let mut grant = Relationship::grant(&user, &role);
        grant.partition_id = "p".into();
        store.add_relationship(&ctx, grant).await.unwrap();
        assert_eq!(
            PartitionReferences {
                identities: 2,
                relationships: 1
            },
            store.partition_references("p").await.unwrap()
        );

        store.remove_identity(&ctx, &role).await.unwrap();
        assert_eq!(
            PartitionReferences {
                identities: 1,
                relationships: 0
            },
            store.partition_references("p").await.unwrap()
        );
    }
}
