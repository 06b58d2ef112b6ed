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
//! Username/password credential handler.
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use rand::distr::{Alphanumeric, SampleString};
use secrecy::{ExposeSecret, SecretString};

use crate::credential::handler::{self, AccountResolver, CredentialHandler};
use crate::credential::password_hashing::PasswordHashing;
use crate::credential::types::*;
use crate::error::IdentityManagementError;
use crate::store::{IdentityStore, InvocationContext};
use crate::types::IdentityType;

const SALT_LENGTH: usize = 16;

/// Bcrypt based password handler.
///
/// Every stored password gets its own random salt put in front of the
/// password before hashing. Bcrypt only reads the first 72 bytes, so the salt
/// must come first to count for long passwords.
#[derive(Clone, Debug, Default)]
pub struct PasswordCredentialHandler {
    hashing: PasswordHashing,
    expires_days: Option<u64>,
}

impl PasswordCredentialHandler {
    pub fn new(hashing: PasswordHashing) -> Self {
        Self {
            hashing,
            expires_days: None,
        }
    }

    /// Expire new passwords after the number of days unless an explicit
    /// expiry is given.
    pub fn with_expires_days(mut self, days: Option<u64>) -> Self {
        self.expires_days = days;
        self
    }

    fn salted(salt: &str, password: &SecretString) -> String {
        format!("{salt}{}", password.expose_secret())
    }

    /// Hash the password with a new salt.
    pub(crate) async fn encode(
        &self,
        password: &SecretString,
    ) -> Result<EncodedPasswordStorage, IdentityManagementError> {
        let salt = Alphanumeric.sample_string(&mut rand::rng(), SALT_LENGTH);
        let encoded_hash = self.hashing.hash(Self::salted(&salt, password)).await?;
        Ok(EncodedPasswordStorage { encoded_hash, salt })
    }

    /// Compare the password with the stored record.
    pub(crate) async fn verify(
        &self,
        password: &SecretString,
        storage: &CredentialStorage,
    ) -> Result<bool, IdentityManagementError> {
        let stored = EncodedPasswordStorage::try_from(storage)?;
        Ok(self
            .hashing
            .verify(Self::salted(&stored.salt, password), &stored.encoded_hash)
            .await?)
    }

    /// Validate username and password, returning the account and the
    /// password record when they match.
    pub(crate) async fn validate_password(
        &self,
        ctx: &InvocationContext,
        credentials: &mut Credentials,
        accounts: &dyn AccountResolver,
        store: &dyn IdentityStore,
        username: &str,
        password: &SecretString,
    ) -> Result<Option<(IdentityType, CredentialStorage)>, IdentityManagementError> {
        let Some((account, storage)) = handler::resolve_account_storage(
            ctx,
            credentials,
            accounts,
            store,
            username,
            PASSWORD,
            |_| true,
        )
        .await?
        else {
            return Ok(None);
        };
        if self.verify(password, &storage).await? {
            Ok(Some((account, storage)))
        } else {
            credentials.set_status(CredentialStatus::Invalid);
            Ok(None)
        }
    }
}

#[async_trait]
impl CredentialHandler for PasswordCredentialHandler {
    fn name(&self) -> &'static str {
        "password"
    }

    fn supported_credentials(&self) -> &'static [&'static str] {
        &[PASSWORD]
    }

    fn supported_values(&self) -> &'static [&'static str] {
        &[PASSWORD]
    }

    #[tracing::instrument(level = "debug", skip(self, ctx, credentials, accounts, store))]
    async fn validate(
        &self,
        ctx: &InvocationContext,
        credentials: &mut Credentials,
        accounts: &dyn AccountResolver,
        store: &dyn IdentityStore,
    ) -> Result<(), IdentityManagementError> {
        let presented = credentials
            .credential::<UsernamePasswordCredentials>()
            .cloned()
            .ok_or_else(|| handler::unsupported(self, credentials.credential_type()))?;
        let Some((account, storage)) = handler::resolve_account_storage(
            ctx,
            credentials,
            accounts,
            store,
            &presented.username,
            PASSWORD,
            |_| true,
        )
        .await?
        else {
            return Ok(());
        };
        let matched = self.verify(&presented.password, &storage).await?;
        handler::complete_validation(ctx, credentials, account, &storage, matched);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, ctx, value, store))]
    async fn update(
        &self,
        ctx: &InvocationContext,
        agent: &IdentityType,
        value: &dyn CredentialValue,
        store: &dyn IdentityStore,
        effective_date: DateTime<Utc>,
        expiry_date: Option<DateTime<Utc>>,
    ) -> Result<(), IdentityManagementError> {
        let password = value
            .as_any()
            .downcast_ref::<Password>()
            .ok_or_else(|| handler::unsupported(self, value.credential_type()))?;
        let encoded = self.encode(&password.0).await?;
        let expiry_date = expiry_date.or_else(|| {
            self.expires_days
                .and_then(|days| effective_date.checked_add_signed(TimeDelta::days(days as i64)))
        });
        let storage = CredentialStorage {
            id: ctx.generate_id(),
            identity_id: agent.id.clone(),
            storage_type: PASSWORD.to_string(),
            effective_date,
            expiry_date,
            fields: encoded.into_fields(),
        };
        handler::store_credential(ctx, store, storage).await
    }
}
