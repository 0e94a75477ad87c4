//! Filter DSL: conditions, groups and query options.

use super::Value;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison operator of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operator {
    /// Equality.
    #[default]
    #[serde(rename = "=")]
    Eq,
    /// Inequality.
    #[serde(rename = "!=")]
    Ne,
    /// Greater than.
    #[serde(rename = ">")]
    Gt,
    /// Less than.
    #[serde(rename = "<")]
    Lt,
    /// Greater than or equal.
    #[serde(rename = ">=")]
    Ge,
    /// Less than or equal.
    #[serde(rename = "<=")]
    Le,
    /// Substring, membership or key presence depending on the field.
    #[serde(rename = "CONTAINS")]
    Contains,
    /// Inclusive range; the operand is a two-element list.
    #[serde(rename = "BETWEEN")]
    Between,
    /// Membership in a list operand.
    #[serde(rename = "IN")]
    In,
    /// SQL `LIKE` pattern.
    #[serde(rename = "LIKE")]
    Like,
    /// Prefix match.
    #[serde(rename = "STARTSWITH")]
    StartsWith,
    /// Suffix match.
    #[serde(rename = "ENDSWITH")]
    EndsWith,
    /// Column is NULL.
    #[serde(rename = "IS NULL")]
    IsNull,
    /// Column is not NULL.
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl Operator {
    /// Returns all operators, longest spelling first for prefix parsing.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::IsNotNull,
            Self::IsNull,
            Self::StartsWith,
            Self::EndsWith,
            Self::Contains,
            Self::Between,
            Self::Like,
            Self::In,
            Self::Ge,
            Self::Le,
            Self::Ne,
            Self::Eq,
            Self::Gt,
            Self::Lt,
        ]
    }

    /// Returns the operator as written in a filter.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Contains => "CONTAINS",
            Self::Between => "BETWEEN",
            Self::In => "IN",
            Self::Like => "LIKE",
            Self::StartsWith => "STARTSWITH",
            Self::EndsWith => "ENDSWITH",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }

    /// Returns true for operators only the SQL backend evaluates.
    ///
    /// In-process evaluation treats these as "no match".
    #[must_use]
    pub const fn is_sql_only(&self) -> bool {
        matches!(
            self,
            Self::Between
                | Self::In
                | Self::Like
                | Self::StartsWith
                | Self::EndsWith
                | Self::IsNull
                | Self::IsNotNull
        )
    }

    const fn is_symbolic(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Gt | Self::Lt | Self::Ge | Self::Le
        )
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::all()
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| Error::InvalidInput(format!("unknown operator: {s}")))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the children of a [`FilterGroup`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupOperator {
    /// All children must match.
    #[default]
    And,
    /// At least one child must match.
    Or,
    /// With one child, its negation; with several, none may match.
    Not,
}

impl GroupOperator {
    /// Returns the operator name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
        }
    }

    /// Parses a group operator (case-insensitive). Unknown names yield `AND`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "OR" => Self::Or,
            "NOT" => Self::Not,
            _ => Self::And,
        }
    }
}

impl fmt::Display for GroupOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// Returns the SQL keyword for this direction.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Parses a direction. Only `DESC` (any case) is descending.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            Self::Desc
        } else {
            Self::Asc
        }
    }
}

/// A single comparison of an entry field against a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Field name, e.g. `Importance` or `SubjectIDs`.
    pub field: String,
    /// Comparison operator.
    #[serde(default)]
    pub operator: Operator,
    /// Operand.
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    /// Builds a condition from an operator spelling.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the operator is unknown.
    pub fn new(field: impl Into<String>, operator: &str, value: impl Into<Value>) -> Result<Self> {
        Ok(Self::with_operator(field, operator.parse()?, value))
    }

    /// Builds a condition from a typed operator.
    #[must_use]
    pub fn with_operator(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Parses `"<Field> <OP> <value>"`, e.g. `Importance >= 50` or
    /// `Tags CONTAINS ops`. The value is read with [`Value::parse_literal`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the field or operator is missing.
    pub fn parse_expr(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        let field_end = expr
            .find(|c: char| c.is_whitespace() || "=!<>".contains(c))
            .ok_or_else(|| Error::InvalidInput(format!("missing operator in '{expr}'")))?;
        let (field, rest) = expr.split_at(field_end);
        if field.is_empty() {
            return Err(Error::InvalidInput(format!("missing field in '{expr}'")));
        }
        let rest = rest.trim_start();

        for op in Operator::all() {
            let Some(after) = strip_operator(rest, *op) else {
                continue;
            };
            let value = match op {
                Operator::IsNull | Operator::IsNotNull => Value::Null,
                _ => Value::parse_literal(after),
            };
            return Ok(Self::with_operator(field, *op, value));
        }
        Err(Error::InvalidInput(format!("unknown operator in '{expr}'")))
    }
}

fn strip_operator(rest: &str, op: Operator) -> Option<&str> {
    let spelling = op.as_str();
    let head = rest.get(..spelling.len())?;
    if !head.eq_ignore_ascii_case(spelling) {
        return None;
    }
    let after = &rest[spelling.len()..];
    if op.is_symbolic() || after.is_empty() || after.starts_with(char::is_whitespace) {
        Some(after.trim())
    } else {
        None
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator, self.value)
    }
}

/// A boolean node combining conditions and nested groups.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterGroup {
    /// How children combine.
    #[serde(default)]
    pub operator: GroupOperator,
    /// Leaf conditions.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Nested groups.
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
}

impl FilterGroup {
    /// Creates a group of the given operator over conditions.
    #[must_use]
    pub const fn new(operator: GroupOperator, conditions: Vec<Condition>) -> Self {
        Self {
            operator,
            conditions,
            groups: Vec::new(),
        }
    }

    /// All conditions must match.
    #[must_use]
    pub const fn and(conditions: Vec<Condition>) -> Self {
        Self::new(GroupOperator::And, conditions)
    }

    /// Any condition must match.
    #[must_use]
    pub const fn or(conditions: Vec<Condition>) -> Self {
        Self::new(GroupOperator::Or, conditions)
    }

    /// No condition may match.
    #[must_use]
    pub const fn not(conditions: Vec<Condition>) -> Self {
        Self::new(GroupOperator::Not, conditions)
    }

    /// Adds a nested group.
    #[must_use]
    pub fn with_group(mut self, group: Self) -> Self {
        self.groups.push(group);
        self
    }

    /// Adds a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Returns true if the group has no children and so matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty() && self.groups.is_empty()
    }
}

/// A complete search request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    /// Root of the condition tree.
    #[serde(default)]
    pub root_group: FilterGroup,
    /// Maximum results; 0 means unlimited.
    #[serde(default)]
    pub limit: usize,
    /// Results to skip; 0 means none.
    #[serde(default)]
    pub offset: usize,
    /// Field to sort by; `None` keeps ascending ID order.
    #[serde(default)]
    pub order_by: Option<String>,
    /// Sort direction.
    #[serde(default)]
    pub order_dir: SortDirection,
    /// Search active and deleted records.
    #[serde(default)]
    pub include_deleted: bool,
    /// Search deleted records only. Takes precedence over `include_deleted`.
    #[serde(default)]
    pub only_deleted: bool,
}

impl Filter {
    /// Creates a filter over active records.
    #[must_use]
    pub fn new(root_group: FilterGroup) -> Self {
        Self {
            root_group,
            ..Self::default()
        }
    }

    /// Sets the result limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the result offset.
    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the sort field and direction.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, dir: SortDirection) -> Self {
        self.order_by = Some(field.into());
        self.order_dir = dir;
        self
    }

    /// Searches deleted records too.
    #[must_use]
    pub const fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Searches deleted records only.
    #[must_use]
    pub const fn only_deleted(mut self) -> Self {
        self.only_deleted = true;
        self
    }

    /// Returns `(active, deleted)`: which lifecycle states the search covers.
    #[must_use]
    pub const fn visibility(&self) -> (bool, bool) {
        if self.only_deleted {
            (false, true)
        } else {
            (true, self.include_deleted)
        }
    }
}
