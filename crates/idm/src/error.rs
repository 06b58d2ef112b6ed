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
//! # Error types
use sea_orm::SqlErr;
use thiserror::Error;

use crate::credential::password_hashing::PasswordHashError;
use crate::feature::FeatureOperation;

/// Builder error.
///
/// A wrapper error that is used instead of the error generated by the
/// `derive_builder`.
#[derive(Error, Debug)]
pub enum BuilderError {
    /// Uninitialized field.
    #[error("{0}")]
    UninitializedField(String),
    /// Custom validation error.
    #[error("{0}")]
    Validation(String),
}

impl From<derive_builder::UninitializedFieldError> for BuilderError {
    fn from(ufe: derive_builder::UninitializedFieldError) -> Self {
        Self::UninitializedField(ufe.to_string())
    }
}

impl From<String> for BuilderError {
    fn from(s: String) -> Self {
        Self::Validation(s)
    }
}

/// Database operation error with the context of the failed operation.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Unique or foreign key constraint violation.
    #[error("{message} while {context}")]
    Conflict { message: String, context: String },

    /// Other SQL error.
    #[error("{message} while {context}")]
    Sql { message: String, context: String },

    /// Generic database error.
    #[error("database error while {context}")]
    Database {
        #[source]
        source: sea_orm::DbErr,
        context: String,
    },
}

/// Attach the operation context to the sea-orm errors.
pub trait DbContextExt<T> {
    fn context(self, context: &str) -> Result<T, DatabaseError>;
}

impl<T> DbContextExt<T> for Result<T, sea_orm::DbErr> {
    fn context(self, context: &str) -> Result<T, DatabaseError> {
        self.map_err(|e| db_err(e, context))
    }
}

/// Convert the DB error into the [`DatabaseError`] with the context
/// information.
pub fn db_err(e: sea_orm::DbErr, context: &str) -> DatabaseError {
    e.sql_err().map_or_else(
        || DatabaseError::Database {
            source: e,
            context: context.to_string(),
        },
        |err| match err {
            SqlErr::UniqueConstraintViolation(descr) => DatabaseError::Conflict {
                message: descr.to_string(),
                context: context.to_string(),
            },
            SqlErr::ForeignKeyConstraintViolation(descr) => DatabaseError::Conflict {
                message: descr.to_string(),
                context: context.to_string(),
            },
            other => DatabaseError::Sql {
                message: other.to_string(),
                context: context.to_string(),
            },
        },
    )
}

/// Fatal configuration errors.
///
/// These signal a deployment or programming error and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityConfigurationError {
    /// The partition manager is already bootstrapped.
    #[error("partition manager is already bootstrapped")]
    AlreadyBootstrapped,

    /// Credential handler registered twice for the same type.
    #[error("credential handler for type {0} is already registered")]
    DuplicateCredentialHandler(String),

    /// Two configurations share the same name.
    #[error("configuration {0} is defined more than once")]
    DuplicateConfiguration(String),

    /// Feature set is locked.
    #[error("feature set is locked and can not be modified")]
    LockedFeatureSet,

    /// More than one credential capable store in a configuration.
    #[error("configuration {0} has more than one store with credential support")]
    MultipleCredentialStores(String),

    /// More than one store supports partitions.
    #[error("only one store may provide partition (realm/tier) support")]
    MultiplePartitionStores,

    /// No configuration given at all.
    #[error("no identity configuration provided")]
    NoConfiguration,

    /// Configuration has no stores.
    #[error("configuration {0} has no identity store")]
    NoStoreConfigured(String),

    /// Operation invoked before bootstrap.
    #[error("partition manager is not bootstrapped")]
    NotBootstrapped,

    /// Store setup failed.
    #[error("identity store {driver} setup failed: {message}")]
    StoreSetup { driver: String, message: String },

    /// Partition references unknown configuration.
    #[error("configuration {0} does not exist")]
    UnknownConfiguration(String),

    /// Unsupported store driver.
    #[error("unsupported driver {0}")]
    UnsupportedDriver(String),
}

/// Identity management error.
///
/// Per call failures the caller is expected to handle.
#[derive(Error, Debug)]
pub enum IdentityManagementError {
    /// Ambiguous identifier resolution.
    #[error("identifier {0} resolves to more than one identity type")]
    AmbiguousIdentityType(String),

    /// Configuration error.
    #[error(transparent)]
    Configuration {
        #[from]
        source: SecurityConfigurationError,
    },

    /// No handler for the presented credential type.
    #[error("no credential handler found for credential type {0}")]
    CredentialHandlerNotFound(String),

    /// Database error.
    #[error(transparent)]
    Database {
        #[from]
        source: DatabaseError,
    },

    /// Group parent does not exist.
    #[error("parent group {id} not found in partition {partition}")]
    GroupParentNotFound { id: String, partition: String },

    /// Identity type with the same natural key already exists.
    #[error("{type_name} {key} already exists in partition {partition}")]
    IdentityTypeAlreadyExists {
        type_name: String,
        key: String,
        partition: String,
    },

    /// Identity type not found.
    #[error("identity type {id} not found in partition {partition}")]
    IdentityTypeNotFound { id: String, partition: String },

    /// Invalid argument.
    #[error("invalid argument [{0}]")]
    InvalidArgument(String),

    /// Relationship violates the slot constraints.
    #[error("invalid {type_name} relationship: {reason}")]
    InvalidRelationship { type_name: String, reason: String },

    /// IO error.
    #[error(transparent)]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Async task join error.
    #[error(transparent)]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Stored credential record can not be interpreted.
    #[error("malformed {storage_type} credential storage: {reason}")]
    MalformedCredentialStorage { storage_type: String, reason: String },

    /// More than one account found for the login name.
    #[error("multiple accounts found for {login_name} in partition {partition}")]
    MultipleAccounts {
        login_name: String,
        partition: String,
    },

    /// Null argument.
    #[error("null argument: [{0}]")]
    NullArgument(String),

    /// Partition with this name already exists.
    #[error("{kind} {name} already exists")]
    PartitionAlreadyExists { kind: String, name: String },

    /// Tier still has child tiers.
    #[error("partition {name} has {children} child tier(s)")]
    PartitionHasChildren { name: String, children: u64 },

    /// Tier parent is not a tier.
    #[error("tier {name} has an invalid parent {parent}")]
    PartitionInvalidParent { name: String, parent: String },

    /// Partition still referenced.
    #[error(
        "partition {name} is still referenced by {identities} identity type(s) and {relationships} relationship(s)"
    )]
    PartitionNotEmpty {
        name: String,
        identities: u64,
        relationships: u64,
    },

    /// Partition not found.
    #[error("partition {0} not found")]
    PartitionNotFound(String),

    /// Partition management is not available.
    #[error("no store with partition support is configured")]
    PartitionStoreNotConfigured,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash {
        #[from]
        source: PasswordHashError,
    },

    /// Relationship not found.
    #[error("relationship {id} not found in partition {partition}")]
    RelationshipNotFound { id: String, partition: String },

    /// (de)serialization error.
    #[error("data serialization error")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    /// Store specific failure.
    #[error("store error: {0}")]
    Store(String),

    /// Structures builder error.
    #[error(transparent)]
    StructBuilder {
        #[from]
        source: BuilderError,
    },

    /// TOTP processing error.
    #[error("totp error: {0}")]
    Totp(String),

    /// Handler does not understand the given credential.
    #[error("credential handler {handler} does not support {credential_type}")]
    UnsupportedCredentialType {
        handler: String,
        credential_type: String,
    },

    /// No store supports the identity type operation.
    #[error("identity type {type_name} does not support {operation}")]
    UnsupportedIdentityType {
        type_name: String,
        operation: FeatureOperation,
    },

    /// Configuration does not allow more than one partition.
    #[error("configuration {0} does not support multiple partitions")]
    UnsupportedMultiRealm(String),

    /// Query parameter not applicable to the query.
    #[error("query parameter {parameter} is not supported for {query_type}")]
    UnsupportedQueryParameter {
        parameter: String,
        query_type: String,
    },

    /// Query parameter value of the wrong type.
    #[error("unsupported value {value} for query parameter {parameter}")]
    UnsupportedQueryParameterValue { parameter: String, value: String },

    /// No store supports the relationship operation.
    #[error("relationship type {type_name} does not support {operation}")]
    UnsupportedRelationshipType {
        type_name: String,
        operation: FeatureOperation,
    },

    /// Request validation error.
    #[error("request validation error: {}", source)]
    Validation {
        /// The source of the error.
        #[from]
        source: validator::ValidationErrors,
    },
}

impl IdentityManagementError {
    /// Whether the error signals a configuration problem.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
