//! Command-line arguments shared by the record and search commands.

use crate::models::{
    Category, Condition, Entry, Filter, FilterGroup, GroupOperator, SortDirection,
};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use uuid::Uuid;

/// Record fields accepted by `add` and `update`.
#[derive(Debug, Clone, Default, Args)]
pub struct EntryArgs {
    /// Record ID; `add` generates a time-ordered UUID when omitted.
    pub id: Option<String>,

    /// Category: fact, message, decision or action.
    #[arg(long, default_value = "fact")]
    pub category: String,

    /// Text content.
    #[arg(long)]
    pub content: Option<String>,

    /// Content type of `--content`.
    #[arg(long, default_value = "text/plain")]
    pub content_type: String,

    /// Importance (0-100 by convention).
    #[arg(short, long, default_value_t = 0)]
    pub importance: i32,

    /// Tag (repeatable).
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Subject ID (repeatable).
    #[arg(long = "subject")]
    pub subjects: Vec<String>,

    /// Subject type.
    #[arg(long, default_value = "")]
    pub subject_type: String,

    /// Source as `id` or `id:type`.
    #[arg(long)]
    pub source: Option<String>,

    /// Owner as `id` or `id:type`.
    #[arg(long)]
    pub owner: Option<String>,

    /// Reference as `id` or `id:type` (repeatable).
    #[arg(long = "reference")]
    pub references: Vec<String>,

    /// Metadata as `key=value` (repeatable).
    #[arg(short, long = "meta")]
    pub metadata: Vec<String>,

    /// Expiry time (RFC 3339).
    #[arg(long)]
    pub expires_at: Option<String>,
}

impl EntryArgs {
    /// Builds the record described by the arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown category, malformed
    /// metadata or an unparseable expiry time.
    pub fn to_entry(&self) -> Result<Entry> {
        let category = Category::parse(&self.category)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category '{}'", self.category)))?;

        let id = self
            .id
            .clone()
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let mut entry = Entry::new(id)
            .with_category(category)
            .with_importance(self.importance)
            .with_tags(self.tags.iter().cloned());
        if let Some(content) = &self.content {
            entry = entry.with_content(&self.content_type, content.as_bytes());
        }
        if !self.subjects.is_empty() || !self.subject_type.is_empty() {
            entry = entry.with_subjects(&self.subject_type, self.subjects.iter().cloned());
        }
        if let Some(source) = &self.source {
            let (id, kind) = split_typed(source);
            entry = entry.with_source(id, kind);
        }
        if let Some(owner) = &self.owner {
            let (id, kind) = split_typed(owner);
            entry = entry.with_owner(id, kind);
        }
        for reference in &self.references {
            let (id, kind) = split_typed(reference);
            entry = entry.with_reference(id, kind);
        }
        for pair in &self.metadata {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidInput(format!("metadata '{pair}' is not key=value"))
            })?;
            entry = entry.with_metadata(key.trim(), value.trim());
        }
        if let Some(expires_at) = &self.expires_at {
            entry = entry.with_expires_at(parse_time(expires_at)?);
        }
        Ok(entry)
    }
}

/// Filter options for `search`.
#[derive(Debug, Clone, Default, Args)]
pub struct SearchArgs {
    /// Condition such as `"Importance >= 50"` (repeatable).
    #[arg(short = 'w', long = "where", value_name = "EXPR")]
    pub conditions: Vec<String>,

    /// Match any condition instead of all.
    #[arg(long, conflicts_with = "not")]
    pub any: bool,

    /// Match records satisfying none of the conditions.
    #[arg(long)]
    pub not: bool,

    /// Field to sort by.
    #[arg(long)]
    pub order_by: Option<String>,

    /// Sort descending.
    #[arg(long)]
    pub desc: bool,

    /// Maximum number of results (0 = no limit).
    #[arg(short, long, default_value_t = 0)]
    pub limit: usize,

    /// Results to skip.
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Include soft-deleted records.
    #[arg(long)]
    pub include_deleted: bool,

    /// Only soft-deleted records.
    #[arg(long, conflicts_with = "include_deleted")]
    pub only_deleted: bool,
}

impl SearchArgs {
    /// Builds the filter described by the arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a condition cannot be parsed.
    pub fn to_filter(&self) -> Result<Filter> {
        let conditions = self
            .conditions
            .iter()
            .map(|expr| Condition::parse_expr(expr))
            .collect::<Result<Vec<_>>>()?;
        let operator = if self.any {
            GroupOperator::Or
        } else if self.not {
            GroupOperator::Not
        } else {
            GroupOperator::And
        };

        let mut filter = Filter::new(FilterGroup::new(operator, conditions))
            .with_limit(self.limit)
            .with_offset(self.offset);
        if let Some(field) = &self.order_by {
            let dir = if self.desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            filter = filter.order_by(field.clone(), dir);
        }
        if self.only_deleted {
            filter = filter.only_deleted();
        } else if self.include_deleted {
            filter = filter.include_deleted();
        }
        Ok(filter)
    }
}

fn split_typed(raw: &str) -> (&str, &str) {
    raw.split_once(':').unwrap_or((raw, ""))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("invalid time '{raw}': {e}")))
}
