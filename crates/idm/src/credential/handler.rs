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

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::credential::types::*;
use crate::error::IdentityManagementError;
use crate::event::IdmEvent;
use crate::store::{CredentialStore, IdentityStore, InvocationContext};
use crate::types::IdentityType;

/// Lookup of the account a presented credential names.
///
/// Accounts may live in another store than their credentials, so handlers
/// resolve them through the identity manager of the partition.
#[async_trait]
pub trait AccountResolver: Send + Sync {
    /// Agent of the partition with the login name.
    async fn find_account(
        &self,
        login_name: &str,
    ) -> Result<Option<IdentityType>, IdentityManagementError>;
}

/// Validator and updater of one or more credential types.
#[async_trait]
pub trait CredentialHandler: fmt::Debug + Send + Sync {
    /// Handler name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Type keys of the presented credentials the handler validates.
    fn supported_credentials(&self) -> &'static [&'static str];

    /// Type keys of the credential values the handler stores.
    fn supported_values(&self) -> &'static [&'static str];

    /// Validate the credentials.
    ///
    /// The status ends up as `VALID` only when the presented credential
    /// matches the latest effective stored record of an enabled account. The
    /// validated agent is set only in that case.
    async fn validate(
        &self,
        ctx: &InvocationContext,
        credentials: &mut Credentials,
        accounts: &dyn AccountResolver,
        store: &dyn IdentityStore,
    ) -> Result<(), IdentityManagementError>;

    /// Store a new credential record for the agent.
    async fn update(
        &self,
        ctx: &InvocationContext,
        agent: &IdentityType,
        value: &dyn CredentialValue,
        store: &dyn IdentityStore,
        effective_date: DateTime<Utc>,
        expiry_date: Option<DateTime<Utc>>,
    ) -> Result<(), IdentityManagementError>;
}

pub(crate) fn credential_store<'a>(
    store: &'a dyn IdentityStore,
) -> Result<&'a dyn CredentialStore, IdentityManagementError> {
    store.credential_store().ok_or_else(|| {
        IdentityManagementError::Store(format!(
            "store {} has no credential support",
            store.driver()
        ))
    })
}

/// Locate an enabled account with the login name.
///
/// Returns `None` with the final status already set when there is no such
/// account or when it is disabled or expired.
pub async fn resolve_account(
    ctx: &InvocationContext,
    credentials: &mut Credentials,
    accounts: &dyn AccountResolver,
    login_name: &str,
) -> Result<Option<IdentityType>, IdentityManagementError> {
    credentials.set_status(CredentialStatus::InProgress);
    credentials.set_validated_agent(None);

    let Some(account) = accounts.find_account(login_name).await? else {
        debug!("no account found for {login_name}");
        credentials.set_status(CredentialStatus::Invalid);
        return Ok(None);
    };
    if !account.enabled || account.is_expired(ctx.now()) {
        credentials.set_status(CredentialStatus::AccountDisabled);
        return Ok(None);
    }
    Ok(Some(account))
}

/// First half of the validation: locate the account and the latest
/// effective storage record.
///
/// Returns `None` with the final status already set when the validation can
/// not proceed.
pub async fn resolve_account_storage(
    ctx: &InvocationContext,
    credentials: &mut Credentials,
    accounts: &dyn AccountResolver,
    store: &dyn IdentityStore,
    login_name: &str,
    storage_type: &str,
    selector: impl Fn(&CredentialStorage) -> bool + Send,
) -> Result<Option<(IdentityType, CredentialStorage)>, IdentityManagementError> {
    let Some(account) = resolve_account(ctx, credentials, accounts, login_name).await? else {
        return Ok(None);
    };
    let history: Vec<CredentialStorage> = credential_store(store)?
        .retrieve_credentials(ctx, &account.id, storage_type)
        .await?
        .into_iter()
        .filter(|rec| selector(rec))
        .collect();
    match latest_effective_credential(&history, ctx.now()) {
        Some(storage) => Ok(Some((account, storage.clone()))),
        None => {
            debug!("no effective {storage_type} credential for {login_name}");
            credentials.set_status(CredentialStatus::Invalid);
            Ok(None)
        }
    }
}

/// Second half of the validation: set the final status.
pub fn complete_validation(
    ctx: &InvocationContext,
    credentials: &mut Credentials,
    account: IdentityType,
    storage: &CredentialStorage,
    matched: bool,
) {
    if matched {
        if storage.is_expired(ctx.now()) {
            credentials.set_status(CredentialStatus::Expired);
        } else {
            credentials.set_status(CredentialStatus::Valid);
            credentials.set_validated_agent(Some(account));
        }
    }
    if credentials.status() == CredentialStatus::InProgress {
        credentials.set_status(CredentialStatus::Invalid);
    }
}

/// Append the record to the credential history of the agent.
pub async fn store_credential(
    ctx: &InvocationContext,
    store: &dyn IdentityStore,
    storage: CredentialStorage,
) -> Result<(), IdentityManagementError> {
    let identity_id = storage.identity_id.clone();
    let storage_type = storage.storage_type.clone();
    credential_store(store)?
        .store_credential(ctx, storage)
        .await?;
    ctx.raise_event(IdmEvent::CredentialUpdated {
        identity_id,
        storage_type,
    });
    Ok(())
}

pub(crate) fn unsupported(
    handler: &dyn CredentialHandler,
    credential_type: &str,
) -> IdentityManagementError {
    IdentityManagementError::UnsupportedCredentialType {
        handler: handler.name().to_string(),
        credential_type: credential_type.to_string(),
    }
}
