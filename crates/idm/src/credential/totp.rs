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
//! Time based one time password handler.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use totp_rs::{Algorithm, Secret, TOTP as Totp};

use crate::credential::handler::{self, AccountResolver, CredentialHandler};
use crate::credential::password::PasswordCredentialHandler;
use crate::credential::types::*;
use crate::error::IdentityManagementError;
use crate::store::{IdentityStore, InvocationContext};
use crate::types::IdentityType;

/// Device name used when the credential does not name one.
pub const DEFAULT_DEVICE: &str = "default";

const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
const TOTP_SKEW: u8 = 1;

/// TOTP handler. Validation requires both the password and the token of the
/// device.
#[derive(Clone, Debug)]
pub struct TotpCredentialHandler {
    password: Arc<PasswordCredentialHandler>,
}

impl TotpCredentialHandler {
    pub fn new(password: Arc<PasswordCredentialHandler>) -> Self {
        Self { password }
    }

    fn totp(secret: &str) -> Result<Totp, IdentityManagementError> {
        let secret_bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| IdentityManagementError::Totp(format!("invalid secret: {e:?}")))?;
        Totp::new(Algorithm::SHA1, TOTP_DIGITS, TOTP_SKEW, TOTP_STEP, secret_bytes)
            .map_err(|e| IdentityManagementError::Totp(e.to_string()))
    }

    /// Generate the token of the secret valid at `time`.
    pub fn generate_token(secret: &str, time: DateTime<Utc>) -> Result<String, IdentityManagementError> {
        Ok(Self::totp(secret)?.generate(time.timestamp().max(0) as u64))
    }

    fn check(
        secret: &str,
        token: &str,
        time: DateTime<Utc>,
    ) -> Result<bool, IdentityManagementError> {
        Ok(Self::totp(secret)?.check(token, time.timestamp().max(0) as u64))
    }
}

#[async_trait]
impl CredentialHandler for TotpCredentialHandler {
    fn name(&self) -> &'static str {
        "totp"
    }

    fn supported_credentials(&self) -> &'static [&'static str] {
        &[TOTP]
    }

    fn supported_values(&self) -> &'static [&'static str] {
        &[TOTP]
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
            .credential::<TotpCredentials>()
            .cloned()
            .ok_or_else(|| handler::unsupported(self, credentials.credential_type()))?;
        if self
            .password
            .validate_password(
                ctx,
                credentials,
                accounts,
                store,
                &presented.username,
                &presented.password,
            )
            .await?
            .is_none()
        {
            return Ok(());
        }

        let device = presented.device.as_deref().unwrap_or(DEFAULT_DEVICE).to_string();
        let Some((account, storage)) = handler::resolve_account_storage(
            ctx,
            credentials,
            accounts,
            store,
            &presented.username,
            TOTP,
            move |rec| rec.field("device").unwrap_or(DEFAULT_DEVICE) == device,
        )
        .await?
        else {
            return Ok(());
        };
        let secret = TotpStorage::try_from(&storage)?.secret;
        let matched = Self::check(&secret, &presented.token, ctx.now())?;
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
        let secret = value
            .as_any()
            .downcast_ref::<TotpSecret>()
            .ok_or_else(|| handler::unsupported(self, value.credential_type()))?;
        // Reject secrets the validation would not be able to use.
        Self::totp(secret.secret.expose_secret())?;
        let storage = CredentialStorage {
            id: ctx.generate_id(),
            identity_id: agent.id.clone(),
            storage_type: TOTP.to_string(),
            effective_date,
            expiry_date,
            fields: TotpStorage {
                secret: secret.secret.expose_secret().to_string(),
                device: secret
                    .device
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            }
            .into_fields(),
        };
        handler::store_credential(ctx, store, storage).await
    }
}
