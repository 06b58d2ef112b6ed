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

use crate::error::IdentityManagementError;
use crate::query::QueryValue;
use crate::types::{AttributeValue, RelationshipKind, check_slot};

/// Relationship query parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RelationshipParameter {
    Id,
    /// Identity referenced in any slot.
    Identity,
    /// Identity referenced in the named slot.
    Slot(String),
    Attribute(String),
}

impl fmt::Display for RelationshipParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str("id"),
            Self::Identity => f.write_str("identity"),
            Self::Slot(slot) => write!(f, "{slot}"),
            Self::Attribute(name) => write!(f, "attribute.{name}"),
        }
    }
}

/// Relationship query.
#[derive(Clone, Debug, Default)]
pub struct RelationshipQuery {
    kind: Option<RelationshipKind>,
    parameters: BTreeMap<RelationshipParameter, Vec<QueryValue>>,
    scope: Vec<String>,
    offset: usize,
    limit: Option<usize>,
}

impl RelationshipQuery {
    /// Query over a single relationship kind.
    pub fn new(kind: RelationshipKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Query over all relationship kinds.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn set_parameter<I, V>(
        &mut self,
        parameter: RelationshipParameter,
        values: I,
    ) -> Result<&mut Self, IdentityManagementError>
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryValue>,
    {
        if let (RelationshipParameter::Slot(slot), Some(kind)) = (&parameter, &self.kind)
            && !kind.is_custom()
            && !kind.slots().contains(&slot.as_str())
        {
            return Err(IdentityManagementError::UnsupportedQueryParameter {
                parameter: parameter.to_string(),
                query_type: kind.to_string(),
            });
        }
        let mut checked = Vec::new();
        for value in values {
            let value = value.into();
            let accepted = match (&parameter, value) {
                (RelationshipParameter::Id, val @ QueryValue::String(_)) => Ok(val),
                (RelationshipParameter::Identity, val @ QueryValue::String(_))
                | (RelationshipParameter::Identity, val @ QueryValue::Identity(_))
                | (RelationshipParameter::Slot(_), val @ QueryValue::String(_)) => Ok(val),
                (RelationshipParameter::Slot(slot), QueryValue::Identity(identity)) => {
                    match &self.kind {
                        Some(kind) if check_slot(kind, slot, &identity.kind).is_err() => {
                            Err(QueryValue::Identity(identity))
                        }
                        _ => Ok(QueryValue::Identity(identity)),
                    }
                }
                (RelationshipParameter::Attribute(_), val @ QueryValue::Attribute(_)) => Ok(val),
                (RelationshipParameter::Attribute(_), QueryValue::String(val)) => {
                    Ok(QueryValue::Attribute(AttributeValue::String(val)))
                }
                (RelationshipParameter::Attribute(_), QueryValue::Boolean(val)) => {
                    Ok(QueryValue::Attribute(AttributeValue::Boolean(val)))
                }
                (_, val) => Err(val),
            };
            checked.push(accepted.map_err(|val| {
                IdentityManagementError::UnsupportedQueryParameterValue {
                    parameter: parameter.to_string(),
                    value: val.to_string(),
                }
            })?);
        }
        if checked.is_empty() {
            return Err(IdentityManagementError::NullArgument(parameter.to_string()));
        }
        self.parameters.insert(parameter, checked);
        Ok(self)
    }

    pub fn with_parameter<V: Into<QueryValue>>(
        mut self,
        parameter: RelationshipParameter,
        value: V,
    ) -> Result<Self, IdentityManagementError> {
        self.set_parameter(parameter, [value])?;
        Ok(self)
    }

    pub fn paginate(mut self, offset: usize, limit: Option<usize>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    pub(crate) fn in_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = scope;
        self
    }

    pub(crate) fn set_scope(&mut self, scope: Vec<String>) {
        self.scope = scope;
    }

    pub fn kind(&self) -> Option<&RelationshipKind> {
        self.kind.as_ref()
    }

    pub fn parameters(&self) -> &BTreeMap<RelationshipParameter, Vec<QueryValue>> {
        &self.parameters
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}
