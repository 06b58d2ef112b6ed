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
//! Client certificate credential handler.
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};

use crate::credential::handler::{self, AccountResolver, CredentialHandler};
use crate::credential::types::*;
use crate::error::IdentityManagementError;
use crate::store::{IdentityStore, InvocationContext};
use crate::types::IdentityType;

/// Certificate handler.
///
/// A presented certificate matches when it is byte for byte the latest
/// effective stored certificate of the account. Trusted certificates only
/// need an enabled account.
#[derive(Clone, Debug, Default)]
pub struct X509CredentialHandler;

#[async_trait]
impl CredentialHandler for X509CredentialHandler {
    fn name(&self) -> &'static str {
        "x509"
    }

    fn supported_credentials(&self) -> &'static [&'static str] {
        &[X509]
    }

    fn supported_values(&self) -> &'static [&'static str] {
        &[X509]
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
            .credential::<X509CertificateCredentials>()
            .cloned()
            .ok_or_else(|| handler::unsupported(self, credentials.credential_type()))?;
        if presented.trusted {
            if let Some(account) =
                handler::resolve_account(ctx, credentials, accounts, &presented.username).await?
            {
                credentials.set_status(CredentialStatus::Valid);
                credentials.set_validated_agent(Some(account));
            }
            return Ok(());
        }
        let Some((account, storage)) = handler::resolve_account_storage(
            ctx,
            credentials,
            accounts,
            store,
            &presented.username,
            X509,
            |_| true,
        )
        .await?
        else {
            return Ok(());
        };
        let stored = X509CertificateStorage::try_from(&storage)?;
        let matched = STANDARD.encode(&presented.certificate) == stored.base64_cert;
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
        let certificate = value
            .as_any()
            .downcast_ref::<X509Certificate>()
            .ok_or_else(|| handler::unsupported(self, value.credential_type()))?;
        if certificate.0.is_empty() {
            return Err(IdentityManagementError::InvalidArgument(
                "empty client certificate".into(),
            ));
        }
        let storage = CredentialStorage {
            id: ctx.generate_id(),
            identity_id: agent.id.clone(),
            storage_type: X509.to_string(),
            effective_date,
            expiry_date,
            fields: X509CertificateStorage {
                base64_cert: STANDARD.encode(&certificate.0),
            }
            .into_fields(),
        };
        handler::store_credential(ctx, store, storage).await
    }
}
