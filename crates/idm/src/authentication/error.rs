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

use thiserror::Error;

use crate::error::IdentityManagementError;

/// Authentication error.
#[derive(Error, Debug)]
pub enum AuthenticationError {
    /// The session already has a logged in agent.
    #[error("an agent is already logged in to this session")]
    AlreadyLoggedIn,

    /// Another login of the session did not complete.
    #[error("authentication of this session is already in progress")]
    AuthenticationInProgress,

    /// Validation succeeded without resolving an agent.
    #[error("credential validation succeeded without an agent")]
    MissingAgent,

    /// Identity management error.
    #[error(transparent)]
    IdentityManagement {
        #[from]
        source: IdentityManagementError,
    },
}
