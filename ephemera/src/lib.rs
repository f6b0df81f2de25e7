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

//! ephemera - ephemeral event cache for relays.
//!
//! Relays keep ephemeral events in a fixed-capacity ring that producers write to concurrently and subscriptions
//! query with filters. Every other event goes to a durable store provided by the relay.

/// Shared components: records, filters, errors and metrics.
pub use ephemera_common as common;
/// The ephemeral ring cache and its query layer.
pub use ephemera_memory as memory;

/// Relay hooks that route events and filters between the ephemeral cache and the durable store.
pub mod relay;

mod prelude;
pub use prelude::*;
