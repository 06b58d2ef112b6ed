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
//! # Feature registry
//!
//! Every store declares which identity type groups, relationship kinds and
//! operations it supports. The declaration is assembled with the
//! [`FeatureSetBuilder`] and frozen into an immutable [`FeatureSet`] once the
//! store configuration is complete. The managers consult the feature set
//! before dispatching an operation to a store.
use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SecurityConfigurationError;
use crate::types::RelationshipKind;

/// Group of features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureGroup {
    Agent,
    User,
    Group,
    Role,
    Relationship,
    Attribute,
    Credential,
    Realm,
    Tier,
}

impl FeatureGroup {
    pub const ALL: [FeatureGroup; 9] = [
        FeatureGroup::Agent,
        FeatureGroup::User,
        FeatureGroup::Group,
        FeatureGroup::Role,
        FeatureGroup::Relationship,
        FeatureGroup::Attribute,
        FeatureGroup::Credential,
        FeatureGroup::Realm,
        FeatureGroup::Tier,
    ];

    /// Operations registered by [`FeatureSetBuilder::add_feature_support`].
    fn default_operations(&self) -> &'static [FeatureOperation] {
        match self {
            Self::Credential => &[
                FeatureOperation::Read,
                FeatureOperation::Update,
                FeatureOperation::Validate,
            ],
            _ => &FeatureOperation::CRUD,
        }
    }
}

impl fmt::Display for FeatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Agent => "agent",
            Self::User => "user",
            Self::Group => "group",
            Self::Role => "role",
            Self::Relationship => "relationship",
            Self::Attribute => "attribute",
            Self::Credential => "credential",
            Self::Realm => "realm",
            Self::Tier => "tier",
        };
        f.write_str(name)
    }
}

/// Operation on a feature group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureOperation {
    Create,
    Read,
    Update,
    Delete,
    Validate,
}

impl FeatureOperation {
    pub const CRUD: [FeatureOperation; 4] = [
        FeatureOperation::Create,
        FeatureOperation::Read,
        FeatureOperation::Update,
        FeatureOperation::Delete,
    ];
}

impl fmt::Display for FeatureOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Validate => "validate",
        };
        f.write_str(name)
    }
}

/// Immutable snapshot of the supported features of a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureSet {
    features: HashMap<FeatureGroup, HashSet<FeatureOperation>>,
    relationships: HashMap<RelationshipKind, HashSet<FeatureOperation>>,
    custom_types: HashMap<String, HashSet<FeatureOperation>>,
    custom_relationships: bool,
    custom_identity_types: bool,
    multi_realm: bool,
}

impl FeatureSet {
    /// Feature set supporting everything, including custom types and
    /// multiple realms.
    pub fn all() -> Self {
        let mut builder = FeatureSetBuilder::new();
        builder.add_all();
        builder.build()
    }

    pub fn supports(&self, group: FeatureGroup, operation: FeatureOperation) -> bool {
        self.features
            .get(&group)
            .is_some_and(|ops| ops.contains(&operation))
    }

    /// Whether any operation of the group is supported.
    pub fn supports_group(&self, group: FeatureGroup) -> bool {
        self.features.get(&group).is_some_and(|ops| !ops.is_empty())
    }

    pub fn supports_relationship(&self, kind: &RelationshipKind) -> bool {
        self.relationships.contains_key(kind) || (kind.is_custom() && self.custom_relationships)
    }

    pub fn supports_relationship_feature(
        &self,
        kind: &RelationshipKind,
        operation: FeatureOperation,
    ) -> bool {
        match self.relationships.get(kind) {
            Some(ops) => ops.contains(&operation),
            None => kind.is_custom() && self.custom_relationships,
        }
    }

    pub fn supports_custom_type(&self, type_name: &str, operation: FeatureOperation) -> bool {
        match self.custom_types.get(type_name) {
            Some(ops) => ops.contains(&operation),
            None => self.custom_identity_types,
        }
    }

    pub fn supports_multi_realm(&self) -> bool {
        self.multi_realm
    }

    /// Whether the store manages partitions.
    pub fn supports_partitions(&self) -> bool {
        self.supports_group(FeatureGroup::Realm) || self.supports_group(FeatureGroup::Tier)
    }

    pub fn supports_credentials(&self) -> bool {
        self.supports_group(FeatureGroup::Credential)
    }

    /// Whether any relationship kind is supported.
    pub fn supports_relationships(&self) -> bool {
        !self.relationships.is_empty() || self.custom_relationships
    }
}

/// Builder of the [`FeatureSet`].
///
/// All mutators fail with [`SecurityConfigurationError::LockedFeatureSet`]
/// once the builder is locked.
#[derive(Debug, Default)]
pub struct FeatureSetBuilder {
    set: FeatureSet,
    locked: bool,
}

impl FeatureSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unlocked(&self) -> Result<(), SecurityConfigurationError> {
        if self.locked {
            return Err(SecurityConfigurationError::LockedFeatureSet);
        }
        Ok(())
    }

    fn add_all(&mut self) {
        for group in FeatureGroup::ALL {
            self.insert_group(group);
        }
        self.set.custom_relationships = true;
        self.set.custom_identity_types = true;
        self.set.multi_realm = true;
    }

    fn insert_group(&mut self, group: FeatureGroup) {
        self.set
            .features
            .entry(group)
            .or_default()
            .extend(group.default_operations());
        if group == FeatureGroup::Relationship {
            for kind in RelationshipKind::defaults() {
                self.set
                    .relationships
                    .entry(kind)
                    .or_default()
                    .extend(FeatureOperation::CRUD);
            }
        }
    }

    /// Add a single operation of a group.
    pub fn add_feature(
        &mut self,
        group: FeatureGroup,
        operation: FeatureOperation,
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        self.set.features.entry(group).or_default().insert(operation);
        Ok(self)
    }

    pub fn remove_feature(
        &mut self,
        group: FeatureGroup,
        operation: FeatureOperation,
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        if let Some(ops) = self.set.features.get_mut(&group) {
            ops.remove(&operation);
            if ops.is_empty() {
                self.set.features.remove(&group);
            }
        }
        Ok(self)
    }

    /// Add the default operations of the groups. An empty slice adds every
    /// group. The relationship group also registers the default relationship
    /// kinds.
    pub fn add_feature_support(
        &mut self,
        groups: &[FeatureGroup],
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        let groups: &[FeatureGroup] = if groups.is_empty() {
            &FeatureGroup::ALL
        } else {
            groups
        };
        for group in groups {
            self.insert_group(*group);
        }
        Ok(self)
    }

    /// Remove every operation of the groups.
    pub fn remove_feature_support(
        &mut self,
        groups: &[FeatureGroup],
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        for group in groups {
            self.set.features.remove(group);
            if *group == FeatureGroup::Relationship {
                self.set.relationships.clear();
            }
        }
        Ok(self)
    }

    /// Add relationship kinds with the given operations (CRUD when empty).
    pub fn add_relationship_support(
        &mut self,
        kinds: &[RelationshipKind],
        operations: &[FeatureOperation],
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        let operations: &[FeatureOperation] = if operations.is_empty() {
            &FeatureOperation::CRUD
        } else {
            operations
        };
        for kind in kinds {
            self.set
                .relationships
                .entry(kind.clone())
                .or_default()
                .extend(operations);
        }
        Ok(self)
    }

    pub fn remove_relationship_support(
        &mut self,
        kind: &RelationshipKind,
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        self.set.relationships.remove(kind);
        Ok(self)
    }

    /// Add a custom identity type with the given operations (CRUD when
    /// empty).
    pub fn add_custom_type_support<S: Into<String>>(
        &mut self,
        type_name: S,
        operations: &[FeatureOperation],
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        let operations: &[FeatureOperation] = if operations.is_empty() {
            &FeatureOperation::CRUD
        } else {
            operations
        };
        self.set
            .custom_types
            .entry(type_name.into())
            .or_default()
            .extend(operations);
        Ok(self)
    }

    /// Accept any relationship kind unknown to the store.
    pub fn supports_custom_relationships(
        &mut self,
        supported: bool,
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        self.set.custom_relationships = supported;
        Ok(self)
    }

    /// Accept any custom identity type.
    pub fn supports_custom_identity_types(
        &mut self,
        supported: bool,
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        self.set.custom_identity_types = supported;
        Ok(self)
    }

    pub fn supports_multi_realm(
        &mut self,
        supported: bool,
    ) -> Result<&mut Self, SecurityConfigurationError> {
        self.check_unlocked()?;
        self.set.multi_realm = supported;
        Ok(self)
    }

    /// Lock the builder. Locking twice is a no-op.
    pub fn lock(&mut self) -> &mut Self {
        self.locked = true;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Lock the builder and return the snapshot.
    pub fn build(&mut self) -> FeatureSet {
        self.lock();
        self.set.clone()
    }
}
