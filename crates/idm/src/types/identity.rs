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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::IdentityManagementError;
use crate::feature::FeatureGroup;
use crate::types::{AttributeValue, Attributes};

/// Kind specific data of an identity type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityKind {
    /// Non human account.
    Agent { login_name: String },
    /// Human account.
    User {
        login_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    },
    /// Group of identities. The path is computed from the parent chain when
    /// the group is added.
    Group {
        name: String,
        #[serde(default)]
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<String>,
    },
    Role { name: String },
    /// Application defined identity type.
    Custom { type_name: String },
}

impl IdentityKind {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Agent { .. } => "Agent",
            Self::User { .. } => "User",
            Self::Group { .. } => "Group",
            Self::Role { .. } => "Role",
            Self::Custom { type_name } => type_name,
        }
    }

    /// Feature group of the built-in kinds.
    pub fn feature_group(&self) -> Option<FeatureGroup> {
        match self {
            Self::Agent { .. } => Some(FeatureGroup::Agent),
            Self::User { .. } => Some(FeatureGroup::User),
            Self::Group { .. } => Some(FeatureGroup::Group),
            Self::Role { .. } => Some(FeatureGroup::Role),
            Self::Custom { .. } => None,
        }
    }

    /// Agents and users share the login name namespace.
    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent { .. } | Self::User { .. })
    }

    pub fn login_name(&self) -> Option<&str> {
        match self {
            Self::Agent { login_name } | Self::User { login_name, .. } => Some(login_name),
            _ => None,
        }
    }

    /// Namespace of the natural key. Agents and users share one.
    pub fn key_space(&self) -> &'static str {
        match self {
            Self::Agent { .. } | Self::User { .. } => "agent",
            Self::Group { .. } => "group",
            Self::Role { .. } => "role",
            Self::Custom { .. } => "custom",
        }
    }

    /// Key unique within a partition.
    pub fn natural_key(&self) -> Option<&str> {
        match self {
            Self::Agent { login_name } | Self::User { login_name, .. } => Some(login_name),
            Self::Group { path, .. } => Some(path),
            Self::Role { name } => Some(name),
            Self::Custom { .. } => None,
        }
    }
}

/// Managed identity entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
pub struct IdentityType {
    /// Opaque identifier unique across the whole store. Empty until stored.
    #[validate(length(max = 64))]
    pub id: String,

    /// Owning partition.
    #[validate(length(max = 64))]
    pub partition_id: String,

    pub kind: IdentityKind,

    pub enabled: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub attributes: Attributes,
}

impl IdentityType {
    pub fn new(kind: IdentityKind) -> Self {
        Self {
            id: String::new(),
            partition_id: String::new(),
            kind,
            enabled: true,
            created_at: Utc::now(),
            expires_at: None,
            attributes: Attributes::new(),
        }
    }

    pub fn agent<S: Into<String>>(login_name: S) -> Self {
        Self::new(IdentityKind::Agent {
            login_name: login_name.into(),
        })
    }

    pub fn user<S: Into<String>>(login_name: S) -> Self {
        Self::new(IdentityKind::User {
            login_name: login_name.into(),
            first_name: None,
            last_name: None,
            email: None,
        })
    }

    /// Top level group.
    pub fn group<S: Into<String>>(name: S) -> Self {
        Self::new(IdentityKind::Group {
            name: name.into(),
            path: String::new(),
            parent_id: None,
        })
    }

    /// Group nested under `parent`.
    pub fn group_with_parent<S: Into<String>>(name: S, parent: &IdentityType) -> Self {
        Self::new(IdentityKind::Group {
            name: name.into(),
            path: String::new(),
            parent_id: Some(parent.id.clone()),
        })
    }

    pub fn role<S: Into<String>>(name: S) -> Self {
        Self::new(IdentityKind::Role { name: name.into() })
    }

    pub fn custom<S: Into<String>>(type_name: S) -> Self {
        Self::new(IdentityKind::Custom {
            type_name: type_name.into(),
        })
    }

    pub fn with_attribute<K: Into<String>, V: Into<AttributeValue>>(
        mut self,
        name: K,
        value: V,
    ) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the user details. Ignored for other kinds.
    pub fn with_user_details(
        mut self,
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
    ) -> Self {
        if let IdentityKind::User {
            first_name: fname,
            last_name: lname,
            email: mail,
            ..
        } = &mut self.kind
        {
            *fname = first_name.map(Into::into);
            *lname = last_name.map(Into::into);
            *mail = email.map(Into::into);
        }
        self
    }

    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    pub fn login_name(&self) -> Option<&str> {
        self.kind.login_name()
    }

    /// Name of a group or role.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            IdentityKind::Group { name, .. } | IdentityKind::Role { name } => Some(name),
            _ => None,
        }
    }

    /// Path of a group.
    pub fn group_path(&self) -> Option<&str> {
        match &self.kind {
            IdentityKind::Group { path, .. } => Some(path),
            _ => None,
        }
    }

    pub fn group_parent_id(&self) -> Option<&str> {
        match &self.kind {
            IdentityKind::Group { parent_id, .. } => parent_id.as_deref(),
            _ => None,
        }
    }

    pub fn is_role(&self) -> bool {
        matches!(self.kind, IdentityKind::Role { .. })
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, IdentityKind::Group { .. })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Check the kind specific mandatory data.
    pub fn validate_kind(&self) -> Result<(), IdentityManagementError> {
        match &self.kind {
            IdentityKind::Agent { login_name } | IdentityKind::User { login_name, .. } => {
                if login_name.trim().is_empty() {
                    return Err(IdentityManagementError::InvalidArgument(
                        "login name must not be empty".into(),
                    ));
                }
                if login_name.len() > 255 {
                    return Err(IdentityManagementError::InvalidArgument(
                        "login name is too long".into(),
                    ));
                }
            }
            IdentityKind::Group { name, .. } => {
                if name.trim().is_empty() || name.contains('/') {
                    return Err(IdentityManagementError::InvalidArgument(format!(
                        "group name `{name}`"
                    )));
                }
            }
            IdentityKind::Role { name } => {
                if name.trim().is_empty() {
                    return Err(IdentityManagementError::InvalidArgument(
                        "role name must not be empty".into(),
                    ));
                }
            }
            IdentityKind::Custom { type_name } => {
                if type_name.trim().is_empty() {
                    return Err(IdentityManagementError::InvalidArgument(
                        "custom type name must not be empty".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for IdentityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.natural_key() {
            Some(key) => write!(f, "{} {} ({})", self.type_name(), key, self.id),
            None => write!(f, "{} {}", self.type_name(), self.id),
        }
    }
}

/// Discriminator used by lookups and queries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum IdentityTypeFilter {
    #[default]
    Any,
    /// Agents including users.
    Agent,
    User,
    Group,
    Role,
    Custom(String),
}

impl IdentityTypeFilter {
    pub fn matches(&self, kind: &IdentityKind) -> bool {
        match (self, kind) {
            (Self::Any, _) => true,
            (Self::Agent, kind) => kind.is_agent(),
            (Self::User, IdentityKind::User { .. }) => true,
            (Self::Group, IdentityKind::Group { .. }) => true,
            (Self::Role, IdentityKind::Role { .. }) => true,
            (Self::Custom(name), IdentityKind::Custom { type_name }) => name == type_name,
            _ => false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Any => "IdentityType",
            Self::Agent => "Agent",
            Self::User => "User",
            Self::Group => "Group",
            Self::Role => "Role",
            Self::Custom(name) => name,
        }
    }

    /// Feature groups the filter spans. Empty for custom types.
    pub fn feature_groups(&self) -> Vec<FeatureGroup> {
        match self {
            Self::Any => vec![
                FeatureGroup::Agent,
                FeatureGroup::User,
                FeatureGroup::Group,
                FeatureGroup::Role,
            ],
            Self::Agent => vec![FeatureGroup::Agent, FeatureGroup::User],
            Self::User => vec![FeatureGroup::User],
            Self::Group => vec![FeatureGroup::Group],
            Self::Role => vec![FeatureGroup::Role],
            Self::Custom(_) => Vec::new(),
        }
    }
}

impl From<&IdentityKind> for IdentityTypeFilter {
    fn from(kind: &IdentityKind) -> Self {
        match kind {
            IdentityKind::Agent { .. } => Self::Agent,
            IdentityKind::User { .. } => Self::User,
            IdentityKind::Group { .. } => Self::Group,
            IdentityKind::Role { .. } => Self::Role,
            IdentityKind::Custom { type_name } => Self::Custom(type_name.clone()),
        }
    }
}
