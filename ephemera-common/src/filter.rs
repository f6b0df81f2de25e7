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

use std::fmt;

use hashbrown::HashMap;
use serde::{
    de::{IgnoredAny, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::record::{EventRecord, Kind, KindClass, Timestamp, CANONICAL_HEX_LEN};

const TAG_KEY_PREFIX: char = '#';

/// Tag constraints of a [`Filter`], keyed by tag name.
///
/// On the wire every constraint is a `#<name>` key of the filter object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilters(HashMap<String, Vec<String>>);

impl TagFilters {
    /// Iterate over `(tag name, acceptable values)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Acceptable values for a tag name, if the tag name is constrained.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Whether no tag name is constrained.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for TagFilters {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, values) in self.0.iter() {
            map.serialize_entry(&format!("{TAG_KEY_PREFIX}{name}"), values)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TagFilters {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TagFiltersVisitor;

        impl<'de> Visitor<'de> for TagFiltersVisitor {
            type Value = TagFilters;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map of `#<name>` keys to string lists")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut tags = HashMap::new();
                while let Some(key) = access.next_key::<String>()? {
                    match key.strip_prefix(TAG_KEY_PREFIX) {
                        Some(name) if !name.is_empty() => {
                            let values = access.next_value::<Vec<String>>()?;
                            tags.insert(name.to_string(), values);
                        }
                        _ => {
                            access.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(TagFilters(tags))
            }
        }

        deserializer.deserialize_map(TagFiltersVisitor)
    }
}

/// A query filter.
///
/// All clauses are combined with AND. Within a clause, the allowed values are combined with OR. An empty clause is
/// unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Identifier prefixes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<String>,
    /// Author key prefixes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    /// Accepted kinds.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<Kind>,
    /// Accepted tag values, keyed by tag name.
    #[serde(flatten)]
    pub tags: TagFilters,
    /// Inclusive lower bound of the creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Timestamp>,
    /// Inclusive upper bound of the creation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<Timestamp>,
    /// Maximum count of matching records. `None` or `Some(0)` is unconstrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    /// Create an unconstrained filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set identifier prefixes.
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set author key prefixes.
    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    /// Set accepted kinds.
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = Kind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    /// Constrain a tag name to the given values.
    pub fn with_tag<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .0
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Set the inclusive lower timestamp bound.
    pub fn with_since(mut self, since: Timestamp) -> Self {
        self.since = Some(since);
        self
    }

    /// Set the inclusive upper timestamp bound.
    pub fn with_until(mut self, until: Timestamp) -> Self {
        self.until = Some(until);
        self
    }

    /// Set the result count limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The count of records a scan over `available` candidates may return.
    pub fn effective_limit(&self, available: usize) -> usize {
        match self.limit {
            Some(limit) if limit > 0 && limit < available => limit,
            _ => available,
        }
    }

    /// Whether any accepted kind is ephemeral.
    pub fn has_ephemeral_kinds(&self) -> bool {
        self.kinds.iter().any(|&kind| KindClass::of(kind).is_ephemeral())
    }

    /// Evaluate whether the record satisfies the filter.
    ///
    /// The evaluation is pure and does not allocate.
    pub fn matches(&self, record: &EventRecord) -> bool {
        if !self.ids.is_empty() && !self.ids.iter().any(|id| matches_hex_prefix(id, record.id())) {
            return false;
        }

        if !self.authors.is_empty()
            && !self
                .authors
                .iter()
                .any(|author| matches_hex_prefix(author, record.author()))
        {
            return false;
        }

        if !self.kinds.is_empty() && !self.kinds.contains(&record.kind()) {
            return false;
        }

        for (name, values) in self.tags.iter() {
            // A tag name without acceptable values does not constrain anything.
            if values.is_empty() {
                continue;
            }
            let found = record.tags().iter().any(|tag| {
                tag.name() == Some(name) && tag.value().is_some_and(|value| values.iter().any(|v| v == value))
            });
            if !found {
                return false;
            }
        }

        if self.since.is_some_and(|since| record.created_at() < since) {
            return false;
        }

        if self.until.is_some_and(|until| record.created_at() > until) {
            return false;
        }

        true
    }
}

/// Exact match, or prefix match when the allowed value is shorter than the canonical length.
#[inline]
fn matches_hex_prefix(allowed: &str, value: &str) -> bool {
    allowed == value || (allowed.len() < CANONICAL_HEX_LEN && value.starts_with(allowed))
}
