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
//! Credential validation and updates within a partition.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::credential::handler::AccountResolver;
use crate::credential::{CredentialStorage, CredentialValue, Credentials, current_credential};
use crate::error::IdentityManagementError;
use crate::feature::FeatureOperation;
use crate::manager::IdentityManager;
use crate::manager::registry::ConfiguredStore;
use crate::query::{IdentityParameter, IdentityQuery};
use crate::store::CredentialStore;
use crate::types::{IdentityType, IdentityTypeFilter};

#[async_trait]
impl AccountResolver for IdentityManager {
    /// Accounts are searched in every agent store of the configuration, but
    /// only the agents of the partition itself qualify.
    async fn find_account(
        &self,
        login_name: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError> {
        let query = IdentityQuery::new(IdentityTypeFilter::Agent)
            .with_parameter(IdentityParameter::LoginName, login_name)?;
        let mut accounts: Vec<IdentityType> = self
            .query(query)
            .await?
            .into_iter()
            .filter(|account| account.partition_id == self.partition.id)
            .collect();
        if accounts.len() > 1 {
            return Err(IdentityManagementError::MultipleAccounts {
                login_name: login_name.to_string(),
                partition: self.partition.name.clone(),
            });
        }
        Ok(accounts.pop())
    }
}

impl IdentityManager {
    fn credential_entry(
        &self,
        operation: FeatureOperation,
    ) -> Result<&ConfiguredStore, IdentityManagementError> {
        self.runtime
            .registry
            .credential_store(self.configuration(), operation)
    }

    fn credentials_of(entry: &ConfiguredStore) -> Result<&dyn CredentialStore, IdentityManagementError> {
        entry.store.credential_store().ok_or_else(|| {
            IdentityManagementError::Store(format!(
                "store {} has no credential support",
                entry.store.driver()
            ))
        })
    }

    /// Visible agent the credentials belong to.
    async fn credential_owner(
        &self,
        agent: &IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        self.lookup_identity_by_id(IdentityTypeFilter::Agent, &agent.id)
            .await?
            .ok_or_else(|| self.not_found(&agent.id))
    }

    /// Agent owned by the partition. Credentials of agents inherited from an
    /// ancestor tier are read only.
    async fn owned_credential_owner(
        &self,
        agent: &IdentityType,
    ) -> Result<IdentityType, IdentityManagementError> {
        self.lookup_identity_by_id(IdentityTypeFilter::Agent, &agent.id)
            .await?
            .filter(|owner| owner.partition_id == self.partition.id)
            .ok_or_else(|| self.not_found(&agent.id))
    }

    /// Validate the presented credentials, recording the outcome in their
    /// status.
    ///
    /// A failed validation is not an error. Errors are reserved for a missing
    /// handler or store failures.
    #[tracing::instrument(level = "info", skip_all, fields(credential_type = credentials.credential_type()))]
    pub async fn validate_credentials(
        &self,
        credentials: &mut Credentials,
    ) -> Result<(), IdentityManagementError> {
        let ctx = self.context();
        let handler = ctx
            .credential_handlers()
            .validator_for(credentials.credential_type())?
            .clone();
        let entry = self.credential_entry(FeatureOperation::Validate)?;
        handler
            .validate(&ctx, credentials, self, entry.store.as_ref())
            .await?;
        debug!("credential validation finished as {:?}", credentials.status());
        Ok(())
    }

    /// Store a new credential of the agent effective from now.
    #[tracing::instrument(level = "info", skip(self, value), fields(agent = %agent))]
    pub async fn update_credential(
        &self,
        agent: &IdentityType,
        value: &dyn CredentialValue,
    ) -> Result<(), IdentityManagementError> {
        let now = self.context().now();
        self.update_credential_with_dates(agent, value, now, None)
            .await
    }

    /// Store a new credential of the agent with explicit effective and
    /// expiry dates. Previous credentials stay in the history.
    #[tracing::instrument(level = "info", skip(self, value), fields(agent = %agent))]
    pub async fn update_credential_with_dates(
        &self,
        agent: &IdentityType,
        value: &dyn CredentialValue,
        effective_date: DateTime<Utc>,
        expiry_date: Option<DateTime<Utc>>,
    ) -> Result<(), IdentityManagementError> {
        let ctx = self.context();
        let handler = ctx
            .credential_handlers()
            .updater_for(value.credential_type())?
            .clone();
        let entry = self.credential_entry(FeatureOperation::Update)?;
        let agent = self.owned_credential_owner(agent).await?;
        handler
            .update(
                &ctx,
                &agent,
                value,
                entry.store.as_ref(),
                effective_date,
                expiry_date,
            )
            .await
    }

    /// Record of the storage type currently in effect for the agent.
    #[tracing::instrument(level = "info", skip(self), fields(agent = %agent))]
    pub async fn retrieve_current_credential(
        &self,
        agent: &IdentityType,
        storage_type: &str,
    ) -> Result<Option<CredentialStorage>, IdentityManagementError> {
        let ctx = self.context();
        let history = self.retrieve_credentials(agent, storage_type).await?;
        Ok(current_credential(&history, ctx.now()).cloned())
    }

    /// Complete history of the storage type, oldest first.
    #[tracing::instrument(level = "info", skip(self), fields(agent = %agent))]
    pub async fn retrieve_credentials(
        &self,
        agent: &IdentityType,
        storage_type: &str,
    ) -> Result<Vec<CredentialStorage>, IdentityManagementError> {
        let entry = self.credential_entry(FeatureOperation::Read)?;
        let agent = self.credential_owner(agent).await?;
        Self::credentials_of(entry)?
            .retrieve_credentials(&self.context(), &agent.id, storage_type)
            .await
    }
}
