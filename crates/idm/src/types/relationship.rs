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

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AttributeValue, Attributes, IdentityKind, IdentityType};

/// Identity receiving a grant.
pub const ASSIGNEE: &str = "assignee";
/// Group of a membership or group role.
pub const GROUP: &str = "group";
/// Member of a group.
pub const MEMBER: &str = "member";
/// Granted role.
pub const ROLE: &str = "role";

/// Relationship kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationshipKind {
    /// Role granted to an identity.
    Grant,
    /// Identity member of a group.
    GroupMembership,
    /// Role granted to an identity within a group.
    GroupRole,
    /// Application defined relationship.
    Custom(String),
}

impl RelationshipKind {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Grant => "grant",
            Self::GroupMembership => "group_membership",
            Self::GroupRole => "group_role",
            Self::Custom(name) => name,
        }
    }

    /// Mandatory identity slots. Custom kinds have free form slots.
    pub fn slots(&self) -> &'static [&'static str] {
        match self {
            Self::Grant => &[ASSIGNEE, ROLE],
            Self::GroupMembership => &[MEMBER, GROUP],
            Self::GroupRole => &[ASSIGNEE, GROUP, ROLE],
            Self::Custom(_) => &[],
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Relationship kinds every relationship capable store understands.
    pub fn defaults() -> [Self; 3] {
        [Self::Grant, Self::GroupMembership, Self::GroupRole]
    }
}

impl From<String> for RelationshipKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "grant" => Self::Grant,
            "group_membership" => Self::GroupMembership,
            "group_role" => Self::GroupRole,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for RelationshipKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<RelationshipKind> for String {
    fn from(value: RelationshipKind) -> Self {
        match value {
            RelationshipKind::Custom(name) => name,
            other => other.type_name().to_string(),
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Check that an identity of `kind` may occupy `slot` of the relationship.
pub fn check_slot(
    relationship: &RelationshipKind,
    slot: &str,
    kind: &IdentityKind,
) -> Result<(), String> {
    if relationship.is_custom() {
        return Ok(());
    }
    if !relationship.slots().contains(&slot) {
        return Err(format!("unknown slot {slot}"));
    }
    let allowed = match slot {
        ROLE => matches!(kind, IdentityKind::Role { .. }),
        GROUP => matches!(kind, IdentityKind::Group { .. }),
        ASSIGNEE => !matches!(kind, IdentityKind::Role { .. }),
        MEMBER => kind.is_agent() || matches!(kind, IdentityKind::Group { .. }),
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(format!("{} can not be used as {slot}", kind.type_name()))
    }
}

/// Typed association between identity types.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Store generated identifier. Empty until stored.
    pub id: String,

    /// Partition the relationship has been created in.
    pub partition_id: String,

    pub kind: RelationshipKind,

    /// Slot name to identity type id.
    pub identities: BTreeMap<String, String>,

    #[serde(default)]
    pub attributes: Attributes,
}

impl Relationship {
    pub fn new(kind: RelationshipKind) -> Self {
        Self {
            id: String::new(),
            partition_id: String::new(),
            kind,
            identities: BTreeMap::new(),
            attributes: Attributes::new(),
        }
    }

    pub fn grant(assignee: &IdentityType, role: &IdentityType) -> Self {
        Self::new(RelationshipKind::Grant)
            .with_identity(ASSIGNEE, assignee)
            .with_identity(ROLE, role)
    }

    pub fn group_membership(member: &IdentityType, group: &IdentityType) -> Self {
        Self::new(RelationshipKind::GroupMembership)
            .with_identity(MEMBER, member)
            .with_identity(GROUP, group)
    }

    pub fn group_role(assignee: &IdentityType, group: &IdentityType, role: &IdentityType) -> Self {
        Self::new(RelationshipKind::GroupRole)
            .with_identity(ASSIGNEE, assignee)
            .with_identity(GROUP, group)
            .with_identity(ROLE, role)
    }

    pub fn with_identity<S: Into<String>>(mut self, slot: S, identity: &IdentityType) -> Self {
        self.identities.insert(slot.into(), identity.id.clone());
        self
    }

    pub fn with_attribute<K: Into<String>, V: Into<AttributeValue>>(
        mut self,
        name: K,
        value: V,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Identity id stored in the slot.
    pub fn identity(&self, slot: &str) -> Option<&str> {
        self.identities.get(slot).map(String::as_str)
    }

    /// Whether any slot points to the identity.
    pub fn references(&self, identity_id: &str) -> bool {
        self.identities.values().any(|id| id == identity_id)
    }
}
