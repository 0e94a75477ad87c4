//! Field accessor registry.
//!
//! Maps the field names used in filters to typed views of [`Entry`] data and
//! to SQL column names. Name lookup accepts the DSL spelling (`SubjectIDs`)
//! and the snake case column spelling (`subject_ids`).

use crate::models::{Entry, Reference};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// A filterable and sortable entry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// `ID`
    Id,
    /// `Category`
    Category,
    /// `ContentType`
    ContentType,
    /// `Content`
    Content,
    /// `Importance`
    Importance,
    /// `CreatedAt`
    CreatedAt,
    /// `UpdatedAt`
    UpdatedAt,
    /// `ExpiresAt`
    ExpiresAt,
    /// `SourceID`
    SourceId,
    /// `SourceType`
    SourceType,
    /// `OwnerID`
    OwnerId,
    /// `OwnerType`
    OwnerType,
    /// `SubjectIDs`
    SubjectIds,
    /// `SubjectType`
    SubjectType,
    /// `Tags`
    Tags,
    /// `References`
    References,
    /// `Metadata`
    Metadata,
}

impl Field {
    /// Returns all fields in declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Id,
            Self::Category,
            Self::ContentType,
            Self::Content,
            Self::Importance,
            Self::CreatedAt,
            Self::UpdatedAt,
            Self::ExpiresAt,
            Self::SourceId,
            Self::SourceType,
            Self::OwnerId,
            Self::OwnerType,
            Self::SubjectIds,
            Self::SubjectType,
            Self::Tags,
            Self::References,
            Self::Metadata,
        ]
    }

    /// Returns the DSL name of the field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Category => "Category",
            Self::ContentType => "ContentType",
            Self::Content => "Content",
            Self::Importance => "Importance",
            Self::CreatedAt => "CreatedAt",
            Self::UpdatedAt => "UpdatedAt",
            Self::ExpiresAt => "ExpiresAt",
            Self::SourceId => "SourceID",
            Self::SourceType => "SourceType",
            Self::OwnerId => "OwnerID",
            Self::OwnerType => "OwnerType",
            Self::SubjectIds => "SubjectIDs",
            Self::SubjectType => "SubjectType",
            Self::Tags => "Tags",
            Self::References => "References",
            Self::Metadata => "Metadata",
        }
    }

    /// Returns the SQL column, quoted where the name is reserved.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Category => "category",
            Self::ContentType => "content_type",
            Self::Content => "content",
            Self::Importance => "importance",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::ExpiresAt => "expires_at",
            Self::SourceId => "source_id",
            Self::SourceType => "source_type",
            Self::OwnerId => "owner_id",
            Self::OwnerType => "owner_type",
            Self::SubjectIds => "subject_ids",
            Self::SubjectType => "subject_type",
            Self::Tags => "tags",
            Self::References => "\"references\"",
            Self::Metadata => "metadata",
        }
    }

    /// Looks a field up by DSL or column name, ignoring case and underscores.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let wanted = normalize(name);
        Self::all()
            .iter()
            .copied()
            .find(|field| normalize(field.name()) == wanted)
    }

    /// Returns true if the database orders this column the way the in-process
    /// sorter does.
    #[must_use]
    pub const fn is_sql_sortable(&self) -> bool {
        !matches!(
            self,
            Self::Content | Self::SubjectIds | Self::Tags | Self::References | Self::Metadata
        )
    }

    /// Returns true for timestamp fields.
    #[must_use]
    pub const fn is_time(&self) -> bool {
        matches!(self, Self::CreatedAt | Self::UpdatedAt | Self::ExpiresAt)
    }

    /// Reads this field from an entry.
    #[must_use]
    pub fn value<'a>(&self, entry: &'a Entry) -> FieldValue<'a> {
        match self {
            Self::Id => FieldValue::Text(&entry.id),
            Self::Category => FieldValue::Text(entry.category.as_str()),
            Self::ContentType => FieldValue::Text(&entry.content_type),
            Self::Content => FieldValue::Bytes(&entry.content),
            Self::Importance => FieldValue::Int(i64::from(entry.importance)),
            Self::CreatedAt => FieldValue::Time(entry.created_at),
            Self::UpdatedAt => FieldValue::Time(entry.updated_at),
            Self::ExpiresAt => FieldValue::Time(entry.expires_at),
            Self::SourceId => FieldValue::Text(&entry.source_id),
            Self::SourceType => FieldValue::Text(&entry.source_type),
            Self::OwnerId => FieldValue::Text(&entry.owner_id),
            Self::OwnerType => FieldValue::Text(&entry.owner_type),
            Self::SubjectIds => FieldValue::List(&entry.subject_ids),
            Self::SubjectType => FieldValue::Text(&entry.subject_type),
            Self::Tags => FieldValue::List(&entry.tags),
            Self::References => FieldValue::References(&entry.references),
            Self::Metadata => FieldValue::Metadata(&entry.metadata),
        }
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A borrowed, typed view of one entry field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// String-like fields, including the category.
    Text(&'a str),
    /// Integer fields.
    Int(i64),
    /// Raw content bytes.
    Bytes(&'a [u8]),
    /// Timestamp fields; `None` when unset.
    Time(Option<DateTime<Utc>>),
    /// String lists.
    List(&'a [String]),
    /// Entry references.
    References(&'a [Reference]),
    /// Metadata map.
    Metadata(&'a BTreeMap<String, String>),
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Self::Time(Some(t)) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Time(None) => Ok(()),
            Self::List(items) => write!(f, "[{}]", items.join(" ")),
            Self::References(refs) => {
                let parts: Vec<String> = refs.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(" "))
            },
            Self::Metadata(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{k}:{v}")).collect();
                write!(f, "map[{}]", parts.join(" "))
            },
        }
    }
}
