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
use std::str::FromStr;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{BuilderError, IdentityManagementError};
use crate::feature::FeatureGroup;
use crate::types::Attributes;

/// Name of the realm used when no partition is requested explicitly.
pub const DEFAULT_REALM: &str = "default";

/// Name of the configuration partitions are bound to unless told otherwise.
pub const DEFAULT_CONFIGURATION: &str = "default";

/// Partition kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    /// Top level tenant.
    Realm,
    /// Nested scope with an optional parent tier.
    Tier,
}

impl PartitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realm => "realm",
            Self::Tier => "tier",
        }
    }

    /// Feature group guarding management of this partition kind.
    pub fn feature_group(&self) -> FeatureGroup {
        match self {
            Self::Realm => FeatureGroup::Realm,
            Self::Tier => FeatureGroup::Tier,
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionKind {
    type Err = IdentityManagementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realm" => Ok(Self::Realm),
            "tier" => Ok(Self::Tier),
            other => Err(IdentityManagementError::InvalidArgument(format!(
                "partition kind {other}"
            ))),
        }
    }
}

/// Isolation boundary for identity types and relationships.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[builder(build_fn(error = "BuilderError"))]
#[builder(setter(strip_option, into))]
pub struct Partition {
    /// Store generated identifier. Empty until the partition is stored.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub id: String,

    /// Partition name, unique per kind.
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    pub kind: PartitionKind,

    /// Parent tier of a tier.
    #[builder(default)]
    #[validate(length(max = 64))]
    pub parent_id: Option<String>,

    /// Name of the identity configuration serving this partition.
    #[builder(default = "DEFAULT_CONFIGURATION.to_string()")]
    #[validate(length(min = 1, max = 255))]
    pub configuration_name: String,

    #[builder(default)]
    #[serde(default)]
    pub attributes: Attributes,
}

impl Partition {
    /// New realm bound to the default configuration.
    pub fn realm<S: Into<String>>(name: S) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            kind: PartitionKind::Realm,
            parent_id: None,
            configuration_name: DEFAULT_CONFIGURATION.to_string(),
            attributes: Attributes::new(),
        }
    }

    /// New tier, optionally nested under `parent`.
    pub fn tier<S: Into<String>>(name: S, parent: Option<&Partition>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            kind: PartitionKind::Tier,
            parent_id: parent.map(|p| p.id.clone()),
            configuration_name: DEFAULT_CONFIGURATION.to_string(),
            attributes: Attributes::new(),
        }
    }

    pub fn is_realm(&self) -> bool {
        self.kind == PartitionKind::Realm
    }

    pub fn is_tier(&self) -> bool {
        self.kind == PartitionKind::Tier
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let sot = PartitionBuilder::default()
            .name("testing")
            .kind(PartitionKind::Realm)
            .build()
            .unwrap();
        assert_eq!(DEFAULT_CONFIGURATION, sot.configuration_name);
        assert!(sot.id.is_empty());
        assert!(sot.is_realm());
        assert!(PartitionBuilder::default().name("missing kind").build().is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Partition::realm("").validate().is_err());
        assert!(Partition::realm("a".repeat(256)).validate().is_err());
        assert!(Partition::realm("ok").validate().is_ok());
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(PartitionKind::Tier, "tier".parse().unwrap());
        assert!("domain".parse::<PartitionKind>().is_err());
    }
}
