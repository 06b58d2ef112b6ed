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
//! # Identity model
//!
//! Partitions, identity types, relationships and their attributes.
mod attribute;
mod identity;
mod partition;
mod relationship;

pub use attribute::{AttributeValue, Attributes};
pub use identity::{IdentityKind, IdentityType, IdentityTypeFilter};
pub use partition::{
    DEFAULT_CONFIGURATION, DEFAULT_REALM, Partition, PartitionBuilder, PartitionKind,
};
pub use relationship::{
    ASSIGNEE, GROUP, MEMBER, ROLE, Relationship, RelationshipKind, check_slot,
};
