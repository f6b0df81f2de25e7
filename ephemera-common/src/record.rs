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

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Canonical length of a hex-encoded record identifier or author key.
pub const CANONICAL_HEX_LEN: usize = 64;

/// Record kind.
pub type Kind = u32;

/// Creation timestamp, in seconds.
pub type Timestamp = i64;

const EPHEMERAL_KINDS: Range<Kind> = 20000..30000;
const REPLACEABLE_KINDS: Range<Kind> = 10000..20000;
const ADDRESSABLE_KINDS: Range<Kind> = 30000..40000;

/// The storage class a record kind belongs to.
///
/// Only [`KindClass::Ephemeral`] records are held by the ephemeral cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindClass {
    /// Regular records, kept by the durable store.
    Regular,
    /// Replaceable records, the latest per author and kind wins.
    Replaceable,
    /// Short-lived records that are never persisted.
    Ephemeral,
    /// Addressable records, the latest per author, kind and `d` tag wins.
    Addressable,
}

impl KindClass {
    /// Classify a record kind.
    pub fn of(kind: Kind) -> Self {
        match kind {
            0 | 3 => Self::Replaceable,
            k if REPLACEABLE_KINDS.contains(&k) => Self::Replaceable,
            k if EPHEMERAL_KINDS.contains(&k) => Self::Ephemeral,
            k if ADDRESSABLE_KINDS.contains(&k) => Self::Addressable,
            _ => Self::Regular,
        }
    }

    /// Whether records of this class live in the ephemeral cache.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral)
    }
}

/// One tag of a record.
///
/// The first element is the tag name, the second one (if any) is the value that filters match against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(Vec<String>);

impl Tag {
    /// Create a tag from its elements.
    pub fn new<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(elements.into_iter().map(Into::into).collect())
    }

    /// The tag name, the first element.
    pub fn name(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// The tag value, the second element.
    pub fn value(&self) -> Option<&str> {
        self.0.get(1).map(String::as_str)
    }

    /// All elements of the tag.
    pub fn elements(&self) -> &[String] {
        &self.0
    }
}

impl<S> From<Vec<S>> for Tag
where
    S: Into<String>,
{
    fn from(elements: Vec<S>) -> Self {
        Self::new(elements)
    }
}

/// One unit of data published to the relay.
///
/// A record is immutable once constructed. The ephemeral cache holds it behind an [`std::sync::Arc`] and never
/// hands out a mutable reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    id: String,
    #[serde(rename = "pubkey")]
    author: String,
    created_at: Timestamp,
    kind: Kind,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    sig: String,
}

impl EventRecord {
    /// Start building a record with the given identifier.
    pub fn builder(id: impl Into<String>) -> EventRecordBuilder {
        EventRecordBuilder {
            record: EventRecord {
                id: id.into(),
                ..Default::default()
            },
        }
    }

    /// Hex identifier, canonically [`CANONICAL_HEX_LEN`] characters.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Hex author key, canonically [`CANONICAL_HEX_LEN`] characters.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Record kind.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The class of the record kind.
    pub fn kind_class(&self) -> KindClass {
        KindClass::of(self.kind)
    }

    /// Creation timestamp in seconds.
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Ordered tags.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Opaque content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Opaque signature, carried through untouched.
    pub fn sig(&self) -> &str {
        &self.sig
    }

    /// An absent record carries no identifier and is refused by the cache.
    pub fn is_absent(&self) -> bool {
        self.id.is_empty()
    }
}

/// Builder for [`EventRecord`].
#[derive(Debug, Clone)]
pub struct EventRecordBuilder {
    record: EventRecord,
}

impl EventRecordBuilder {
    /// Set the author key.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.record.author = author.into();
        self
    }

    /// Set the kind.
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.record.kind = kind;
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.record.created_at = created_at;
        self
    }

    /// Append a tag.
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.record.tags.push(tag.into());
        self
    }

    /// Set the content.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.record.content = content.into();
        self
    }

    /// Set the signature.
    pub fn with_sig(mut self, sig: impl Into<String>) -> Self {
        self.record.sig = sig.into();
        self
    }

    /// Build the record.
    pub fn build(self) -> EventRecord {
        self.record
    }
}
