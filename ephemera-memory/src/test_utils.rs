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

//! Utilities for testing.

use std::sync::Arc;

use ephemera_common::record::{EventRecord, Kind};

/// A record with id `id-{i}`, created at `i`, tagged `["e", "test-tag"]`.
pub fn record(i: usize, kind: Kind) -> EventRecord {
    let id = format!("id-{i}");
    EventRecord::builder(&id)
        .with_author(format!("test-pubkey-{id}"))
        .with_kind(kind)
        .with_created_at(i as i64)
        .with_tag(vec!["e", "test-tag"])
        .with_content(format!("test content {id}"))
        .build()
}

/// Collect the ids of the given records.
pub fn ids(records: impl IntoIterator<Item = Arc<EventRecord>>) -> Vec<String> {
    records.into_iter().map(|record| record.id().to_string()).collect()
}
