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

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::IdentitySection;
use crate::credential::digest::DigestCredentialHandler;
use crate::credential::handler::CredentialHandler;
use crate::credential::password::PasswordCredentialHandler;
use crate::credential::password_hashing::PasswordHashing;
use crate::credential::totp::TotpCredentialHandler;
use crate::credential::x509::X509CredentialHandler;
use crate::error::{IdentityManagementError, SecurityConfigurationError};

/// Names of the built-in handlers.
const BUILT_IN: [&str; 4] = ["password", "totp", "digest", "x509"];

/// Credential type to handler table.
///
/// Built once at configuration time from the types every handler declares.
/// Dispatch is an exact lookup of the credential type key.
#[derive(Clone, Debug, Default)]
pub struct CredentialHandlerRegistry {
    validators: HashMap<&'static str, Arc<dyn CredentialHandler>>,
    updaters: HashMap<&'static str, Arc<dyn CredentialHandler>>,
}

impl CredentialHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all built-in handlers.
    pub fn with_defaults(hashing: PasswordHashing) -> Result<Self, SecurityConfigurationError> {
        let password = Arc::new(PasswordCredentialHandler::new(hashing));
        let mut registry = Self::new();
        registry
            .register(Arc::new(TotpCredentialHandler::new(password.clone())))?
            .register(password)?
            .register(Arc::new(DigestCredentialHandler))?
            .register(Arc::new(X509CredentialHandler))?;
        Ok(registry)
    }

    /// Registry with the handlers enabled in the configuration.
    pub fn from_config(section: &IdentitySection) -> Result<Self, SecurityConfigurationError> {
        let password = Arc::new(
            PasswordCredentialHandler::new(PasswordHashing::from(section))
                .with_expires_days(section.password_expires_days),
        );
        let enabled = |name: &str| {
            section.credential_handlers.is_empty()
                || section.credential_handlers.iter().any(|x| x == name)
        };
        let mut registry = Self::new();
        if enabled("password") {
            registry.register(password.clone())?;
        }
        if enabled("totp") {
            registry.register(Arc::new(TotpCredentialHandler::new(password)))?;
        }
        if enabled("digest") {
            registry.register(Arc::new(DigestCredentialHandler))?;
        }
        if enabled("x509") {
            registry.register(Arc::new(X509CredentialHandler))?;
        }
        for name in &section.credential_handlers {
            if !BUILT_IN.contains(&name.as_str()) {
                return Err(SecurityConfigurationError::UnsupportedDriver(format!(
                    "credential handler {name}"
                )));
            }
        }
        Ok(registry)
    }

    /// Register the handler for all types it declares.
    pub fn register(
        &mut self,
        handler: Arc<dyn CredentialHandler>,
    ) -> Result<&mut Self, SecurityConfigurationError> {
        for credential_type in handler.supported_credentials() {
            if self.validators.contains_key(credential_type) {
                return Err(SecurityConfigurationError::DuplicateCredentialHandler(
                    credential_type.to_string(),
                ));
            }
        }
        for value_type in handler.supported_values() {
            if self.updaters.contains_key(value_type) {
                return Err(SecurityConfigurationError::DuplicateCredentialHandler(
                    value_type.to_string(),
                ));
            }
        }
        debug!("registering credential handler {}", handler.name());
        for credential_type in handler.supported_credentials() {
            self.validators.insert(*credential_type, handler.clone());
        }
        for value_type in handler.supported_values() {
            self.updaters.insert(*value_type, handler.clone());
        }
        Ok(self)
    }

    /// Handler validating the presented credential type.
    pub fn validator_for(
        &self,
        credential_type: &str,
    ) -> Result<&Arc<dyn CredentialHandler>, IdentityManagementError> {
        self.validators.get(credential_type).ok_or_else(|| {
            IdentityManagementError::CredentialHandlerNotFound(credential_type.to_string())
        })
    }

    /// Handler storing the credential value type.
    pub fn updater_for(
        &self,
        value_type: &str,
    ) -> Result<&Arc<dyn CredentialHandler>, IdentityManagementError> {
        self.updaters.get(value_type).ok_or_else(|| {
            IdentityManagementError::CredentialHandlerNotFound(value_type.to_string())
        })
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty() && self.updaters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::types::{DIGEST, PASSWORD, TOTP, X509};

    #[test]
    fn test_defaults() {
        let sot = CredentialHandlerRegistry::with_defaults(PasswordHashing::default()).unwrap();
        assert_eq!("password", sot.validator_for(PASSWORD).unwrap().name());
        assert_eq!("totp", sot.updater_for(TOTP).unwrap().name());
        assert_eq!("digest", sot.validator_for(DIGEST).unwrap().name());
        assert_eq!("x509", sot.updater_for(X509).unwrap().name());
        assert!(matches!(
            sot.validator_for("token"),
            Err(IdentityManagementError::CredentialHandlerNotFound(t)) if t == "token"
        ));
    }

    #[test]
    fn test_duplicate() {
        let mut sot = CredentialHandlerRegistry::new();
        sot.register(Arc::new(PasswordCredentialHandler::default()))
            .unwrap();
        assert_eq!(
            Some(SecurityConfigurationError::DuplicateCredentialHandler(
                PASSWORD.into()
            )),
            sot.register(Arc::new(PasswordCredentialHandler::default()))
                .err()
        );
    }

    #[test]
    fn test_from_config() {
        let section = IdentitySection {
            credential_handlers: vec!["password".into()],
            ..Default::default()
        };
        let sot = CredentialHandlerRegistry::from_config(&section).unwrap();
        assert!(sot.validator_for(PASSWORD).is_ok());
        assert!(sot.validator_for(TOTP).is_err());
        assert!(sot.validator_for(DIGEST).is_err());

        let section = IdentitySection {
            credential_handlers: vec!["x509".into(), "digest".into()],
            ..Default::default()
        };
        let sot = CredentialHandlerRegistry::from_config(&section).unwrap();
        assert!(sot.validator_for(X509).is_ok());
        assert!(sot.updater_for(DIGEST).is_ok());
        assert!(sot.validator_for(PASSWORD).is_err());

        let section = IdentitySection {
            credential_handlers: vec!["token".into()],
            ..Default::default()
        };
        assert!(CredentialHandlerRegistry::from_config(&section).is_err());
    }
}
