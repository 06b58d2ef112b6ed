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
//! # Credentials
//!
//! Presented credentials ([`Credentials`]) are validated and credential
//! values ([`CredentialValue`]) are stored by the [`CredentialHandler`]
//! registered for their type key in the [`CredentialHandlerRegistry`].
//!
//! Stored credentials ([`CredentialStorage`]) form an append-only history
//! per identity. The current record is the most recent one that is effective
//! and not expired.
pub mod digest;
pub mod handler;
pub mod password;
pub mod password_hashing;
pub mod registry;
pub mod totp;
pub mod types;
pub mod x509;

pub use digest::DigestCredentialHandler;
pub use handler::{AccountResolver, CredentialHandler};
pub use password::PasswordCredentialHandler;
pub use registry::CredentialHandlerRegistry;
pub use totp::TotpCredentialHandler;
pub use types::*;
pub use x509::X509CredentialHandler;
