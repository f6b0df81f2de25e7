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

//! A fixed-capacity ring cache for ephemeral records, with a filter query layer on top of it.
//!
//! Producers call `put` concurrently, consumers evaluate filters against snapshots of the ring. Once the ring is
//! full, every put overwrites the oldest record.

mod cache;
mod locked;
mod query;
mod ring;
mod store;

#[cfg(test)]
pub(crate) mod test_utils;

mod prelude;
pub use prelude::*;
