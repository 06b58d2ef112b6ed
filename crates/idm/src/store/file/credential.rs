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

use crate::credential::CredentialStorage;
use crate::error::IdentityManagementError;
use crate::store::file::FileIdentityStore;
use crate::store::{CredentialStore, InvocationContext};

#[async_trait]
impl CredentialStore for FileIdentityStore {
    #[tracing::instrument(level = "debug", skip(self, _ctx, storage), fields(identity_id = %storage.identity_id))]
    async fn store_credential(
        &self,
        _ctx: &InvocationContext,
        storage: CredentialStorage,
    ) -> Result<(), IdentityManagementError> {
        self.mutate(move |state| {
            state.append_credential(storage);
            Ok(())
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn retrieve_credentials(
        &self,
        _ctx: &InvocationContext,
        identity_id: &str,
        storage_type: &str,
    ) -> Result<Vec<CredentialStorage>, IdentityManagementError> {
        Ok(self
            .read(|state| state.credentials_of(identity_id, storage_type))
            .await)
    }

    #[tracing::instrument(level = "debug", skip(self, _ctx))]
    async fn remove_credentials(
        &self,
        _ctx: &InvocationContext,
        identity_id: &str,
    ) -> Result<u64, IdentityManagementError> {
        self.mutate(|state| Ok(state.delete_credentials(identity_id)))
            .await
    }
}
