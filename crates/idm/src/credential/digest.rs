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
//! HTTP digest credential handler.
//!
//! Only the HA1 (`MD5(username:realm:password)`) of every realm is stored.
//! A presented digest is either that HA1 or the request digest of a `qop`
//! challenge.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use secrecy::ExposeSecret;

use crate::credential::handler::{self, AccountResolver, CredentialHandler};
use crate::credential::types::*;
use crate::error::IdentityManagementError;
use crate::store::{IdentityStore, InvocationContext};
use crate::types::IdentityType;

fn md5_hex(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            hasher.update(b":");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Hex encoded `MD5(username:realm:password)`.
pub fn calculate_ha1(username: &str, realm: &str, password: &str) -> String {
    md5_hex(&[username, realm, password])
}

/// Hex encoded `MD5(method:uri)`.
pub fn calculate_ha2(method: &str, uri: &str) -> String {
    md5_hex(&[method, uri])
}

/// Request digest the client computes for the challenge.
pub fn calculate_response(ha1: &str, challenge: &DigestChallenge) -> String {
    md5_hex(&[
        ha1,
        &challenge.nonce,
        &challenge.nonce_count,
        &challenge.client_nonce,
        &challenge.qop,
        &calculate_ha2(&challenge.method, &challenge.uri),
    ])
}

/// Digest handler. Records of other realms are ignored during validation.
#[derive(Clone, Debug, Default)]
pub struct DigestCredentialHandler;

#[async_trait]
impl CredentialHandler for DigestCredentialHandler {
    fn name(&self) -> &'static str {
        "digest"
    }

    fn supported_credentials(&self) -> &'static [&'static str] {
        &[DIGEST]
    }

    fn supported_values(&self) -> &'static [&'static str] {
        &[DIGEST]
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
            .credential::<DigestCredentials>()
            .cloned()
            .ok_or_else(|| handler::unsupported(self, credentials.credential_type()))?;
        let realm = presented.realm.clone();
        let Some((account, storage)) = handler::resolve_account_storage(
            ctx,
            credentials,
            accounts,
            store,
            &presented.username,
            DIGEST,
            move |rec| rec.field("realm") == Some(realm.as_str()),
        )
        .await?
        else {
            return Ok(());
        };
        let ha1 = DigestStorage::try_from(&storage)?.ha1;
        let expected = match &presented.challenge {
            Some(challenge) => calculate_response(&ha1, challenge),
            None => ha1,
        };
        let matched = expected.eq_ignore_ascii_case(&presented.response);
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
            .downcast_ref::<DigestPassword>()
            .ok_or_else(|| handler::unsupported(self, value.credential_type()))?;
        let login_name = agent.login_name().ok_or_else(|| {
            IdentityManagementError::InvalidArgument(format!(
                "{} {} has no login name for a digest",
                agent.type_name(),
                agent.id
            ))
        })?;
        let storage = CredentialStorage {
            id: ctx.generate_id(),
            identity_id: agent.id.clone(),
            storage_type: DIGEST.to_string(),
            effective_date,
            expiry_date,
            fields: DigestStorage {
                ha1: calculate_ha1(
                    login_name,
                    &password.realm,
                    password.password.expose_secret(),
                ),
                realm: password.realm.clone(),
            }
            .into_fields(),
        };
        handler::store_credential(ctx, store, storage).await
    }
}
