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
//! Password hashing.
use std::cmp::max;

use thiserror::Error;
use tokio::task;
use tracing::warn;

use crate::config::{IdentitySection, PasswordHashingAlgo};

/// Password hashing related errors.
#[derive(Error, Debug)]
pub enum PasswordHashError {
    /// Bcrypt error.
    #[error(transparent)]
    BCrypt {
        #[from]
        source: bcrypt::BcryptError,
    },

    /// Async task join error.
    #[error(transparent)]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
}

/// Password hashing parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PasswordHashing {
    pub algorithm: PasswordHashingAlgo,
    pub max_password_length: usize,
    pub rounds: Option<usize>,
}

impl Default for PasswordHashing {
    fn default() -> Self {
        Self {
            algorithm: PasswordHashingAlgo::Bcrypt,
            max_password_length: 4096,
            rounds: None,
        }
    }
}

impl From<&IdentitySection> for PasswordHashing {
    fn from(value: &IdentitySection) -> Self {
        Self {
            algorithm: value.password_hashing_algorithm,
            max_password_length: value.max_password_length,
            rounds: value.password_hash_rounds,
        }
    }
}

fn verify_length_and_trunc_password(password: &[u8], max_length: usize) -> &[u8] {
    if password.len() > max_length {
        warn!("Truncating password to the specified value");
        return &password[..max_length];
    }
    password
}

impl PasswordHashing {
    /// Calculate the password hash.
    pub async fn hash<S: AsRef<[u8]>>(&self, password: S) -> Result<String, PasswordHashError> {
        match self.algorithm {
            PasswordHashingAlgo::Bcrypt => {
                let password_bytes = verify_length_and_trunc_password(
                    password.as_ref(),
                    max(self.max_password_length, 72),
                )
                .to_owned();
                let rounds = self.rounds.unwrap_or(12) as u32;
                let hash =
                    task::spawn_blocking(move || bcrypt::hash(password_bytes, rounds)).await??;
                Ok(hash)
            }
        }
    }

    /// Verify the password matches the hashed value.
    pub async fn verify<P: AsRef<[u8]>, H: AsRef<str>>(
        &self,
        password: P,
        hash: H,
    ) -> Result<bool, PasswordHashError> {
        match self.algorithm {
            PasswordHashingAlgo::Bcrypt => {
                let password_bytes = verify_length_and_trunc_password(
                    password.as_ref(),
                    max(self.max_password_length, 72),
                )
                .to_owned();
                let password_hash = hash.as_ref().to_string();
                // bcrypt is slow on purpose, keep it off the runtime threads.
                let verify =
                    task::spawn_blocking(move || bcrypt::verify(password_bytes, &password_hash))
                        .await??;
                Ok(verify)
            }
        }
    }
}
