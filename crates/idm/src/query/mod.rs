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
//! # Queries
//!
//! Typed identity and relationship queries. Parameter values are checked
//! when they are set, so a query reaching a store is always well formed.
//!
//! The relational identity parameters (`HasRole`, `RoleOf`, `MemberOf`,
//! `HasMember`) are resolved by the [`engine`] into identity id constraints
//! through relationship queries before the identity query reaches a store.
pub mod engine;
pub mod identity;
pub mod matcher;
pub mod relationship;

pub use identity::{IdentityParameter, IdentityQuery, QueryValue, SortField};
pub use relationship::{RelationshipParameter, RelationshipQuery};
