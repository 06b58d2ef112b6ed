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
//! # Authentication
//!
//! An [`Authenticator`] turns presented [`Credentials`] into an
//! [`AuthenticationResult`]. The [`SessionIdentity`] keeps the agent logged
//! in to a session and publishes the login and logout events.
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::credential::{CredentialStatus, Credentials};
use crate::event::{EventBridge, IdmEvent};
use crate::manager::IdentityManager;
use crate::types::IdentityType;

mod error;
#[cfg(test)]
pub mod mock;

pub use error::AuthenticationError;
#[cfg(test)]
pub use mock::MockAuthenticator;

/// Outcome of an authentication attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthenticationStatus {
    Success,
    Failure,
}

/// Authentication result with the authenticated agent on success.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthenticationResult {
    pub status: AuthenticationStatus,
    pub agent: Option<IdentityType>,
}

impl AuthenticationResult {
    pub fn success(agent: IdentityType) -> Self {
        Self {
            status: AuthenticationStatus::Success,
            agent: Some(agent),
        }
    }

    pub fn failure() -> Self {
        Self {
            status: AuthenticationStatus::Failure,
            agent: None,
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate the credentials. An unsuccessful authentication is a
    /// [`AuthenticationStatus::Failure`] result, not an error.
    async fn authenticate(
        &self,
        credentials: &mut Credentials,
    ) -> Result<AuthenticationResult, AuthenticationError>;
}

/// Authenticator validating the credentials in the partition of an identity
/// manager.
#[derive(Clone, Debug)]
pub struct IdmAuthenticator {
    identity_manager: IdentityManager,
}

impl IdmAuthenticator {
    pub fn new(identity_manager: IdentityManager) -> Self {
        Self { identity_manager }
    }
}

#[async_trait]
impl Authenticator for IdmAuthenticator {
    #[tracing::instrument(level = "info", skip_all, fields(credential_type = credentials.credential_type()))]
    async fn authenticate(
        &self,
        credentials: &mut Credentials,
    ) -> Result<AuthenticationResult, AuthenticationError> {
        self.identity_manager
            .validate_credentials(credentials)
            .await?;
        if credentials.status() != CredentialStatus::Valid {
            debug!("credentials rejected as {:?}", credentials.status());
            return Ok(AuthenticationResult::failure());
        }
        let agent = credentials
            .validated_agent()
            .cloned()
            .ok_or(AuthenticationError::MissingAgent)?;
        Ok(AuthenticationResult::success(agent))
    }
}

/// Marks an authentication as running until dropped, so a login future
/// cancelled mid-way does not leave the session locked.
struct InProgress<'a>(&'a mut bool);

impl<'a> InProgress<'a> {
    fn start(flag: &'a mut bool) -> Self {
        *flag = true;
        Self(flag)
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        *self.0 = false;
    }
}

/// Agent logged in to a session.
pub struct SessionIdentity {
    authenticator: Arc<dyn Authenticator>,
    event_bridge: Arc<dyn EventBridge>,
    agent: Option<IdentityType>,
    authenticating: bool,
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionIdentity")
            .field("agent", &self.agent)
            .field("authenticating", &self.authenticating)
            .finish()
    }
}

impl SessionIdentity {
    pub fn new(authenticator: Arc<dyn Authenticator>, event_bridge: Arc<dyn EventBridge>) -> Self {
        Self {
            authenticator,
            event_bridge,
            agent: None,
            authenticating: false,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.agent.is_some()
    }

    /// Logged in agent.
    pub fn agent(&self) -> Option<&IdentityType> {
        self.agent.as_ref()
    }

    /// Authenticate the credentials and log the agent in on success.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn login(
        &mut self,
        credentials: &mut Credentials,
    ) -> Result<AuthenticationStatus, AuthenticationError> {
        if self.is_logged_in() {
            return Err(AuthenticationError::AlreadyLoggedIn);
        }
        if self.authenticating {
            return Err(AuthenticationError::AuthenticationInProgress);
        }
        let res = {
            let _in_progress = InProgress::start(&mut self.authenticating);
            self.event_bridge.raise_event(IdmEvent::PreAuthenticate);
            self.authenticator.authenticate(credentials).await
        };

        let result = match res {
            Ok(result) => result,
            Err(err) => {
                warn!("authentication failed: {err}");
                self.event_bridge.raise_event(IdmEvent::LoginFailed {
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };
        self.event_bridge.raise_event(IdmEvent::PostAuthenticate {
            status: result.status,
        });
        match (result.status, result.agent) {
            (AuthenticationStatus::Success, Some(agent)) => {
                self.event_bridge.raise_event(IdmEvent::LoggedIn {
                    agent: agent.clone(),
                });
                self.agent = Some(agent);
                Ok(AuthenticationStatus::Success)
            }
            _ => {
                self.event_bridge.raise_event(IdmEvent::LoginFailed {
                    reason: format!("{:?}", credentials.status()),
                });
                Ok(AuthenticationStatus::Failure)
            }
        }
    }

    /// Log the agent out. Does nothing when nobody is logged in.
    #[tracing::instrument(level = "info", skip_all)]
    pub fn logout(&mut self) {
        if let Some(agent) = self.agent.clone() {
            self.event_bridge.raise_event(IdmEvent::PreLoggedOut {
                agent: agent.clone(),
            });
            self.agent = None;
            self.event_bridge
                .raise_event(IdmEvent::PostLoggedOut { agent });
        }
    }
}
