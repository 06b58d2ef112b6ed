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
//! # Events
//!
//! Domain events published by the stores, the managers and the session
//! identity. Publishing is fire-and-forget.
use std::fmt;

use tokio::sync::broadcast;
use tracing::trace;

use crate::authentication::AuthenticationStatus;
use crate::types::{IdentityType, Partition, Relationship};

#[cfg(test)]
pub mod mock;
#[cfg(test)]
pub use mock::MockEventBridge;

/// Domain event.
#[derive(Clone, Debug, PartialEq)]
pub enum IdmEvent {
    /// Authentication is about to start.
    PreAuthenticate,
    /// Authentication finished.
    PostAuthenticate { status: AuthenticationStatus },
    /// Agent logged in.
    LoggedIn { agent: IdentityType },
    /// Authentication failed.
    LoginFailed { reason: String },
    /// Agent is about to be logged out.
    PreLoggedOut { agent: IdentityType },
    /// Agent logged out.
    PostLoggedOut { agent: IdentityType },

    IdentityTypeCreated(IdentityType),
    IdentityTypeUpdated(IdentityType),
    IdentityTypeDeleted(IdentityType),
    RelationshipCreated(Relationship),
    RelationshipUpdated(Relationship),
    RelationshipDeleted(Relationship),
    CredentialUpdated {
        identity_id: String,
        storage_type: String,
    },
    PartitionCreated(Partition),
    PartitionUpdated(Partition),
    PartitionDeleted(Partition),
}

/// Receiver of the domain events.
pub trait EventBridge: fmt::Debug + Send + Sync {
    /// Publish the event. Listener failures are not handled.
    fn raise_event(&self, event: IdmEvent);
}

/// Bridge dropping all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEventBridge;

impl EventBridge for NoopEventBridge {
    fn raise_event(&self, _event: IdmEvent) {}
}

/// Bridge publishing the events to a broadcast channel.
#[derive(Clone, Debug)]
pub struct BroadcastEventBridge {
    sender: broadcast::Sender<IdmEvent>,
}

impl BroadcastEventBridge {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IdmEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBridge {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBridge for BroadcastEventBridge {
    fn raise_event(&self, event: IdmEvent) {
        // Sending only fails without subscribers.
        if self.sender.send(event).is_err() {
            trace!("event dropped, no subscribers");
        }
    }
}
