//! Knowledge entry types.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Fractional-second digits kept on stored timestamps (microseconds).
pub const TIMESTAMP_DIGITS: u16 = 6;

/// Truncates a timestamp to the stored precision.
#[must_use]
pub fn truncate_time(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(TIMESTAMP_DIGITS)
}

/// MIME-like content type strings commonly stored in [`Entry::content_type`].
pub mod content_types {
    /// JSON content.
    pub const JSON: &str = "application/json";
    /// Plain text content.
    pub const TEXT: &str = "text/plain";
    /// YAML content.
    pub const YAML: &str = "application/yaml";
    /// XML content.
    pub const XML: &str = "application/xml";
    /// CSV content.
    pub const CSV: &str = "text/csv";
    /// Opaque binary content.
    pub const BINARY: &str = "application/octet-stream";
    /// HTML content.
    pub const HTML: &str = "text/html";
    /// Markdown content.
    pub const MARKDOWN: &str = "text/markdown";
}

/// Conventional importance levels. Stores do not enforce them.
pub mod importance {
    /// Routine information.
    pub const NONE: i32 = 0;
    /// Somewhat important.
    pub const LOW: i32 = 25;
    /// Moderately important.
    pub const MEDIUM: i32 = 50;
    /// Highly important.
    pub const HIGH: i32 = 75;
    /// Must not be forgotten.
    pub const CRITICAL: i32 = 100;
}

/// High-level category of a knowledge entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Established truths: stack choices, policies, hard rules.
    #[default]
    Fact,
    /// A single message exchanged between agents or humans.
    Message,
    /// A decision with its context and authority.
    Decision,
    /// A record of something that was done.
    Action,
}

impl Category {
    /// Returns all category variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Fact, Self::Message, Self::Decision, Self::Action]
    }

    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Message => "message",
            Self::Decision => "decision",
            Self::Action => "action",
        }
    }

    /// Parses a category from a string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "fact" => Some(Self::Fact),
            "message" => Some(Self::Message),
            "decision" => Some(Self::Decision),
            "action" => Some(Self::Action),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A weak pointer to another entry. Never validated for existence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    /// ID of the referenced entry.
    pub id: String,
    /// Kind of relation or referenced record.
    #[serde(rename = "type")]
    pub ref_type: String,
}

impl Reference {
    /// Creates a new reference.
    #[must_use]
    pub fn new(id: impl Into<String>, ref_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ref_type: ref_type.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{} {}}}", self.id, self.ref_type)
    }
}

/// A single stored knowledge record.
///
/// Timestamps are `None` until a store fills them in: `created_at` and
/// `updated_at` are set to the write time when left unset. `expires_at` is
/// advisory; no backend purges on expiry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Caller-assigned unique identifier.
    pub id: String,
    /// High-level category.
    #[serde(default)]
    pub category: Category,
    /// MIME-like content type.
    #[serde(default)]
    pub content_type: String,
    /// Opaque content bytes (base64 in JSON).
    #[serde(default, with = "content_base64")]
    pub content: Vec<u8>,
    /// Importance, conventionally one of the [`importance`] levels.
    #[serde(default)]
    pub importance: i32,
    /// Creation time.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Advisory expiry time.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Where this knowledge came from.
    #[serde(default)]
    pub source_id: String,
    /// Kind of source: "chat", "api", "observation", ...
    #[serde(default)]
    pub source_type: String,
    /// Who created or owns this knowledge.
    #[serde(default)]
    pub owner_id: String,
    /// Kind of owner: "agent", "human", "tool", ...
    #[serde(default)]
    pub owner_type: String,
    /// Who or what this knowledge is about.
    #[serde(default)]
    pub subject_ids: Vec<String>,
    /// Kind of subject.
    #[serde(default)]
    pub subject_type: String,
    /// Tags used for membership tests.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Pointers to related entries.
    #[serde(default)]
    pub references: Vec<Reference>,
    /// Free-form key/value context.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Entry {
    /// Creates an entry with the given ID and default field values.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Sets the category.
    #[must_use]
    pub const fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Sets the content and its content type.
    #[must_use]
    pub fn with_content(mut self, content_type: &str, content: impl Into<Vec<u8>>) -> Self {
        self.content_type = content_type.to_string();
        self.content = content.into();
        self
    }

    /// Sets plain text content.
    #[must_use]
    pub fn with_text(self, text: &str) -> Self {
        self.with_content(content_types::TEXT, text.as_bytes())
    }

    /// Sets the importance.
    #[must_use]
    pub const fn with_importance(mut self, importance: i32) -> Self {
        self.importance = importance;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Replaces the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the subjects of this entry.
    #[must_use]
    pub fn with_subjects<I, S>(mut self, subject_type: &str, subject_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subject_type = subject_type.to_string();
        self.subject_ids = subject_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the source attribution.
    #[must_use]
    pub fn with_source(mut self, source_id: &str, source_type: &str) -> Self {
        self.source_id = source_id.to_string();
        self.source_type = source_type.to_string();
        self
    }

    /// Sets the owner attribution.
    #[must_use]
    pub fn with_owner(mut self, owner_id: &str, owner_type: &str) -> Self {
        self.owner_id = owner_id.to_string();
        self.owner_type = owner_type.to_string();
        self
    }

    /// Adds a reference to another entry.
    #[must_use]
    pub fn with_reference(mut self, id: &str, ref_type: &str) -> Self {
        self.references.push(Reference::new(id, ref_type));
        self
    }

    /// Adds a metadata pair.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    /// Sets the last modification time.
    #[must_use]
    pub const fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Sets the advisory expiry time.
    #[must_use]
    pub const fn with_expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Fills unset creation and modification times with `now`, then
    /// truncates every timestamp to microseconds.
    pub fn fill_timestamps(&mut self, now: DateTime<Utc>) {
        self.created_at.get_or_insert(now);
        self.updated_at.get_or_insert(now);
        self.truncate_timestamps();
    }

    /// Truncates every set timestamp to microseconds.
    pub fn truncate_timestamps(&mut self) {
        for at in [&mut self.created_at, &mut self.updated_at, &mut self.expires_at] {
            if let Some(t) = at {
                *t = truncate_time(*t);
            }
        }
    }

    /// Returns the content as text, replacing invalid UTF-8.
    #[must_use]
    pub fn content_lossy(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Serde adapter storing content bytes as standard base64.
mod content_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(deserializer)?;
        encoded.map_or_else(
            || Ok(Vec::new()),
            |s| STANDARD.decode(s).map_err(serde::de::Error::custom),
        )
    }
}
