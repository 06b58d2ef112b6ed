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
//! # Plugin manager
//!
//! Identity stores and credential handlers not shipped with the crate are
//! registered here by name before the partition manager is bootstrapped. The
//! `[identity]` driver of the configuration file is looked up among the
//! registered stores first.
use std::collections::HashMap;
use std::sync::Arc;

use crate::credential::{CredentialHandler, CredentialHandlerRegistry};
use crate::error::SecurityConfigurationError;
use crate::store::IdentityStore;

/// Plugin manager allowing to pass custom store and credential handler
/// plugins during the start.
#[derive(Clone, Default)]
pub struct PluginManager {
    /// Identity store plugins.
    identity_stores: HashMap<String, Arc<dyn IdentityStore>>,
    /// Credential handler plugins.
    credential_handlers: Vec<Arc<dyn CredentialHandler>>,
}

impl PluginManager {
    /// Register identity store.
    pub fn register_identity_store<S: AsRef<str>>(
        &mut self,
        name: S,
        plugin: Arc<dyn IdentityStore>,
    ) {
        self.identity_stores
            .insert(name.as_ref().to_string(), plugin);
    }

    /// Register credential handler.
    pub fn register_credential_handler(&mut self, plugin: Arc<dyn CredentialHandler>) {
        self.credential_handlers.push(plugin);
    }

    /// Get registered identity store.
    #[allow(clippy::borrowed_box)]
    pub fn get_identity_store<S: AsRef<str>>(
        &self,
        name: S,
    ) -> Option<&Arc<dyn IdentityStore>> {
        self.identity_stores.get(name.as_ref())
    }

    /// Add the registered credential handlers to the registry.
    pub fn extend_credential_handlers(
        &self,
        registry: &mut CredentialHandlerRegistry,
    ) -> Result<(), SecurityConfigurationError> {
        for handler in &self.credential_handlers {
            registry.register(handler.clone())?;
        }
        Ok(())
    }
}
