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
//! Per call context handed to the stores.
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::credential::CredentialHandlerRegistry;
use crate::error::SecurityConfigurationError;
use crate::event::{EventBridge, IdmEvent, NoopEventBridge};
use crate::store::IdentityCache;
use crate::types::Partition;

/// Parameter overriding the current time of the call.
pub const REFERENCE_TIME: &str = "reference_time";

/// Generator of opaque unique identifiers.
pub trait IdGenerator: fmt::Debug + Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID identifiers.
#[derive(Clone, Copy, Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Cross cutting services of a single store invocation.
#[derive(Clone)]
pub struct InvocationContext {
    partition: Partition,
    scope: Vec<String>,
    event_bridge: Arc<dyn EventBridge>,
    cache: Option<Arc<IdentityCache>>,
    id_generator: Arc<dyn IdGenerator>,
    credential_handlers: Arc<CredentialHandlerRegistry>,
    parameters: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl InvocationContext {
    /// Partition the call is executed for.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Ids of the partitions visible from the partition, nearest first.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub fn raise_event(&self, event: IdmEvent) {
        self.event_bridge.raise_event(event);
    }

    pub fn event_bridge(&self) -> &Arc<dyn EventBridge> {
        &self.event_bridge
    }

    pub fn cache(&self) -> Option<&IdentityCache> {
        self.cache.as_deref()
    }

    pub fn generate_id(&self) -> String {
        self.id_generator.generate()
    }

    pub fn credential_handlers(&self) -> &CredentialHandlerRegistry {
        &self.credential_handlers
    }

    pub fn set_parameter<K: Into<String>, V: Any + Send + Sync>(&mut self, name: K, value: V) {
        self.parameters.insert(name.into(), Arc::new(value));
    }

    pub fn with_parameter<K: Into<String>, V: Any + Send + Sync>(mut self, name: K, value: V) -> Self {
        self.set_parameter(name, value);
        self
    }

    /// Typed parameter, `None` when missing or of another type.
    pub fn parameter<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.parameters
            .get(name)
            .and_then(|val| val.downcast_ref::<T>())
    }

    /// Current time of the call.
    pub fn now(&self) -> DateTime<Utc> {
        self.parameter::<DateTime<Utc>>(REFERENCE_TIME)
            .copied()
            .unwrap_or_else(Utc::now)
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("partition", &self.partition.name)
            .field("scope", &self.scope)
            .field("parameters", &self.parameters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Creates the context of every store invocation.
pub trait InvocationContextFactory: fmt::Debug + Send + Sync {
    /// Context for a call in the partition seeing the partitions of `scope`.
    fn create_context(&self, partition: &Partition, scope: Vec<String>) -> InvocationContext;
}

/// Factory sharing the same services among all contexts.
#[derive(Clone, Debug)]
pub struct DefaultContextFactory {
    event_bridge: Arc<dyn EventBridge>,
    cache: Option<Arc<IdentityCache>>,
    id_generator: Arc<dyn IdGenerator>,
    credential_handlers: Arc<CredentialHandlerRegistry>,
}

impl DefaultContextFactory {
    pub fn new(credential_handlers: CredentialHandlerRegistry) -> Self {
        Self {
            event_bridge: Arc::new(NoopEventBridge),
            cache: None,
            id_generator: Arc::new(UuidGenerator),
            credential_handlers: Arc::new(credential_handlers),
        }
    }

    /// Factory with the credential handlers and the cache of the
    /// configuration file.
    pub fn from_config(config: &Config) -> Result<Self, SecurityConfigurationError> {
        let mut factory = Self::new(CredentialHandlerRegistry::from_config(&config.identity)?);
        if let Some(cache) = IdentityCache::from_config(&config.cache) {
            factory = factory.with_cache(cache);
        }
        Ok(factory)
    }

    pub fn with_event_bridge(mut self, event_bridge: Arc<dyn EventBridge>) -> Self {
        self.event_bridge = event_bridge;
        self
    }

    pub fn with_cache(mut self, cache: IdentityCache) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn with_credential_handlers(mut self, credential_handlers: CredentialHandlerRegistry) -> Self {
        self.credential_handlers = Arc::new(credential_handlers);
        self
    }
}

impl InvocationContextFactory for DefaultContextFactory {
    fn create_context(&self, partition: &Partition, scope: Vec<String>) -> InvocationContext {
        InvocationContext {
            partition: partition.clone(),
            scope,
            event_bridge: self.event_bridge.clone(),
            cache: self.cache.clone(),
            id_generator: self.id_generator.clone(),
            credential_handlers: self.credential_handlers.clone(),
            parameters: HashMap::new(),
        }
    }
}
