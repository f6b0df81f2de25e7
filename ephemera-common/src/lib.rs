// Copyright 2026 foyer Project Authors
//
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

//! Shared components for ephemera.

/// Allow to enable debug assertions in release profile with feature "strict_assertion".
pub mod assert;
/// Error type and helpers for ephemera.
pub mod error;
/// Query filters and the predicate that evaluates them.
pub mod filter;
/// The metrics abstraction and the metrics model of the ephemeral cache.
pub mod metrics;
/// The event record held by the ephemeral cache.
pub mod record;
