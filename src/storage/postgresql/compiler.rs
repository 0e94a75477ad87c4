//! Compiles filters into parameterized PostgreSQL queries.
//!
//! Mirrors the in-process evaluator: `AND`/`OR` joins, `NOT` as a conjunction
//! of negated children, empty nested groups as `TRUE`. Every leaf is wrapped
//! in `COALESCE(..., FALSE)` so NULL columns give the same two-valued answers
//! as in-process evaluation.
//!
//! Every operand is a bound parameter, metadata keys included. Unknown
//! fields, unsupported operators and operands of the wrong type are errors:
//! where in-process evaluation fails open, compilation fails closed.

use crate::models::{
    Condition, Filter, FilterGroup, GroupOperator, Operator, SortDirection, Value, truncate_time,
};
use crate::query::comparator::{parse_number, NUMBER_PATTERN};
use crate::query::Field;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Table holding knowledge entries.
pub const TABLE: &str = "knowledge_entry";

/// Columns selected for an entry, in row-decoding order.
pub const SELECT_COLUMNS: &str = "id::text, category, content_type, content, importance, \
     created_at, updated_at, expires_at, source_id, source_type, owner_id, owner_type, \
     subject_ids, subject_type, tags, \"references\", metadata, is_deleted";

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// `TEXT`
    Text(String),
    /// `BYTEA`
    Bytes(Vec<u8>),
    /// `FLOAT8`
    Float(f64),
    /// `INT8`
    Int(i64),
    /// `TIMESTAMPTZ`
    Time(DateTime<Utc>),
    /// `TEXT[]`
    TextArray(Vec<String>),
    /// `JSONB`
    Json(serde_json::Value),
    /// `UUID`
    Uuid(Uuid),
}

/// A compiled search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// SQL text with `$n` placeholders.
    pub sql: String,
    /// Parameters for the placeholders, in order.
    pub params: Vec<SqlParam>,
    /// Field to sort by after fetching, when the database cannot order it.
    /// Pagination then also happens after fetching.
    pub client_sort: Option<(Field, SortDirection)>,
}

/// Escapes SQL LIKE wildcards in a string to make them literal.
///
/// ```
/// use knowstore::storage::postgresql::compiler::escape_like_wildcards;
///
/// assert_eq!(escape_like_wildcards("100%"), "100\\%");
/// assert_eq!(escape_like_wildcards("user_name"), "user\\_name");
/// assert_eq!(escape_like_wildcards("path\\file"), "path\\\\file");
/// ```
#[must_use]
pub fn escape_like_wildcards(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            },
            _ => result.push(c),
        }
    }
    result
}

/// Builds the full search statement for an account.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if any condition cannot be compiled.
pub fn build_search_query(filter: &Filter, account_id: Uuid) -> Result<SearchQuery> {
    let mut compiler = Compiler::default();
    let account = compiler.bind(SqlParam::Uuid(account_id));
    let mut sql = format!("SELECT {SELECT_COLUMNS} FROM {TABLE} WHERE account_id = {account}");

    match filter.visibility() {
        (false, true) => sql.push_str(" AND is_deleted = TRUE"),
        (true, false) => sql.push_str(" AND is_deleted = FALSE"),
        _ => {},
    }

    if !filter.root_group.is_empty() {
        let clause = compiler.group(&filter.root_group)?;
        sql.push_str(" AND (");
        sql.push_str(&clause);
        sql.push(')');
    }

    let order_field = filter.order_by.as_deref().and_then(Field::parse);
    let client_sort = order_field
        .filter(|f| !f.is_sql_sortable())
        .map(|f| (f, filter.order_dir));

    match order_field.filter(Field::is_sql_sortable) {
        Some(field) => sql.push_str(&order_clause(field, filter.order_dir)),
        None => sql.push_str(" ORDER BY id ASC"),
    }

    if client_sort.is_none() {
        if filter.limit > 0 {
            let p = compiler.bind(SqlParam::Int(to_i64(filter.limit)));
            sql.push_str(&format!(" LIMIT {p}"));
        }
        if filter.offset > 0 {
            let p = compiler.bind(SqlParam::Int(to_i64(filter.offset)));
            sql.push_str(&format!(" OFFSET {p}"));
        }
    }

    Ok(SearchQuery {
        sql,
        params: compiler.params,
        client_sort,
    })
}

/// Compiles a filter group into a boolean SQL expression.
///
/// Placeholders are numbered from `$first_param`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if any condition cannot be compiled.
pub fn build_where_clause(
    group: &FilterGroup,
    first_param: usize,
) -> Result<(String, Vec<SqlParam>)> {
    let mut compiler = Compiler {
        params: Vec::new(),
        offset: first_param.saturating_sub(1),
    };
    let clause = compiler.group(group)?;
    Ok((clause, compiler.params))
}

fn order_clause(field: Field, dir: SortDirection) -> String {
    let column = match field {
        Field::Id => "id".to_string(),
        Field::Importance => "importance".to_string(),
        f if f.is_time() => f.column().to_string(),
        // byte order, matching in-process string comparison
        f => format!("{} COLLATE \"C\"", f.column()),
    };
    let nulls = if field.is_time() {
        match dir {
            SortDirection::Asc => " NULLS FIRST",
            SortDirection::Desc => " NULLS LAST",
        }
    } else {
        ""
    };
    format!(" ORDER BY {column} {}{nulls}, id ASC", dir.as_str())
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[derive(Default)]
struct Compiler {
    params: Vec<SqlParam>,
    offset: usize,
}

impl Compiler {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.offset + self.params.len())
    }

    fn group(&mut self, group: &FilterGroup) -> Result<String> {
        if group.is_empty() {
            return Ok("TRUE".to_string());
        }

        let mut parts = Vec::with_capacity(group.conditions.len() + group.groups.len());
        for condition in &group.conditions {
            let expr = self.condition(condition)?;
            parts.push(format!("COALESCE({expr}, FALSE)"));
        }
        for nested in &group.groups {
            parts.push(format!("({})", self.group(nested)?));
        }

        Ok(match group.operator {
            GroupOperator::And => parts.join(" AND "),
            GroupOperator::Or => parts.join(" OR "),
            GroupOperator::Not => parts
                .iter()
                .map(|p| format!("NOT {p}"))
                .collect::<Vec<_>>()
                .join(" AND "),
        })
    }

    fn condition(&mut self, condition: &Condition) -> Result<String> {
        let field = Field::parse(&condition.field)
            .ok_or_else(|| invalid(format!("unknown field '{}'", condition.field)))?;
        let op = condition.operator;
        let value = &condition.value;

        let compiled = match field {
            Field::Metadata => self.metadata(op, value),
            Field::Tags | Field::SubjectIds => self.list(field.column(), op, value),
            Field::References => self.references(op, value),
            Field::Content => self.content(op, value),
            Field::Importance => self.importance(op, value),
            f if f.is_time() => self.time(f.column(), op, value),
            Field::Id => self.text("id::text", op, value),
            f => self.text(f.column(), op, value),
        };
        compiled.map_err(|e| match e {
            Error::InvalidInput(msg) => invalid(format!("{}: {msg}", condition.field)),
            other => other,
        })
    }

    fn text(&mut self, col: &str, op: Operator, value: &Value) -> Result<String> {
        Ok(match op {
            Operator::Eq => format!("({col} = {})", self.bind_text(value)),
            Operator::Ne => format!("({col} IS DISTINCT FROM {})", self.bind_text(value)),
            Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => self.ordered(col, op, value),
            Operator::Contains => self.like(col, &format!("%{}%", escape_like_wildcards(&value.to_string()))),
            Operator::StartsWith => self.like(col, &format!("{}%", escape_like_wildcards(&value.to_string()))),
            Operator::EndsWith => self.like(col, &format!("%{}", escape_like_wildcards(&value.to_string()))),
            Operator::Like => {
                let p = self.bind(SqlParam::Text(value.to_string()));
                format!("({col} LIKE {p})")
            },
            Operator::In => {
                let items = list_items(value);
                let params: Vec<String> = items
                    .iter()
                    .map(|v| self.bind(SqlParam::Text(v.to_string())))
                    .collect();
                in_list(col, &params)
            },
            Operator::Between => {
                let (low, high) = pair(value)?;
                let low = self.bind_text(low);
                let high = self.bind_text(high);
                format!("({col} COLLATE \"C\" BETWEEN {low} AND {high})")
            },
            Operator::IsNull => format!("(NULLIF({col}, '') IS NULL)"),
            Operator::IsNotNull => format!("(NULLIF({col}, '') IS NOT NULL)"),
        })
    }

    /// Importance compares as text for `=` and `!=`, like the in-process
    /// string forms, and numerically for ordering when the operand is a number.
    fn importance(&mut self, op: Operator, value: &Value) -> Result<String> {
        const COL: &str = "importance::float8";
        Ok(match op {
            Operator::Eq => format!("(importance::text = {})", self.bind_text(value)),
            Operator::Ne => format!("(importance::text IS DISTINCT FROM {})", self.bind_text(value)),
            Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
                let operand = value.to_string();
                match parse_number(&operand) {
                    Some(n) => {
                        let p = self.bind(SqlParam::Float(n));
                        format!("({COL} {} {p})", op.as_str())
                    },
                    None => {
                        let p = self.bind(SqlParam::Text(operand));
                        format!("(importance::text COLLATE \"C\" {} {p})", op.as_str())
                    },
                }
            },
            Operator::In => {
                let params = list_items(value)
                    .iter()
                    .map(|v| number(v).map(|n| self.bind(SqlParam::Float(n))))
                    .collect::<Result<Vec<_>>>()?;
                in_list(COL, &params)
            },
            Operator::Between => {
                let (low, high) = pair(value)?;
                let low = self.bind(SqlParam::Float(number(low)?));
                let high = self.bind(SqlParam::Float(number(high)?));
                format!("({COL} BETWEEN {low} AND {high})")
            },
            Operator::Contains
            | Operator::Like
            | Operator::StartsWith
            | Operator::EndsWith => self.text("importance::text", op, value)?,
            Operator::IsNull => "(importance IS NULL)".to_string(),
            Operator::IsNotNull => "(importance IS NOT NULL)".to_string(),
        })
    }

    fn time(&mut self, col: &str, op: Operator, value: &Value) -> Result<String> {
        Ok(match op {
            Operator::Eq | Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
                let p = self.bind(SqlParam::Time(timestamp(value)?));
                format!("({col} {} {p})", op.as_str())
            },
            Operator::Ne => {
                let p = self.bind(SqlParam::Time(timestamp(value)?));
                format!("({col} IS DISTINCT FROM {p})")
            },
            Operator::In => {
                let params = list_items(value)
                    .iter()
                    .map(|v| timestamp(v).map(|t| self.bind(SqlParam::Time(t))))
                    .collect::<Result<Vec<_>>>()?;
                in_list(col, &params)
            },
            Operator::Between => {
                let (low, high) = pair(value)?;
                let low = self.bind(SqlParam::Time(timestamp(low)?));
                let high = self.bind(SqlParam::Time(timestamp(high)?));
                format!("({col} BETWEEN {low} AND {high})")
            },
            Operator::IsNull => format!("({col} IS NULL)"),
            Operator::IsNotNull => format!("({col} IS NOT NULL)"),
            other => return Err(unsupported(other)),
        })
    }

    fn content(&mut self, op: Operator, value: &Value) -> Result<String> {
        let bytes = match value {
            Value::Bytes(b) => b.clone(),
            other => other.to_string().into_bytes(),
        };
        Ok(match op {
            Operator::Eq => format!("(content = {})", self.bind(SqlParam::Bytes(bytes))),
            Operator::Ne => format!(
                "(content IS DISTINCT FROM {})",
                self.bind(SqlParam::Bytes(bytes))
            ),
            Operator::Contains => format!(
                "(position({}::bytea in content) > 0)",
                self.bind(SqlParam::Bytes(bytes))
            ),
            Operator::IsNull => "(content IS NULL OR length(content) = 0)".to_string(),
            Operator::IsNotNull => "(content IS NOT NULL AND length(content) > 0)".to_string(),
            other => return Err(unsupported(other)),
        })
    }

    fn list(&mut self, col: &str, op: Operator, value: &Value) -> Result<String> {
        Ok(match (op, value) {
            (Operator::Contains, Value::List(items)) => {
                let wanted = items.iter().map(ToString::to_string).collect();
                let p = self.bind(SqlParam::TextArray(wanted));
                format!("({col} @> {p}::text[])")
            },
            (Operator::Contains, other) => {
                let p = self.bind(SqlParam::Text(other.to_string()));
                format!("({p} = ANY({col}))")
            },
            (Operator::IsNull, _) => format!("(COALESCE(cardinality({col}), 0) = 0)"),
            (Operator::IsNotNull, _) => format!("(COALESCE(cardinality({col}), 0) > 0)"),
            (other, _) => return Err(unsupported(other)),
        })
    }

    fn references(&mut self, op: Operator, value: &Value) -> Result<String> {
        const COL: &str = "\"references\"";
        Ok(match (op, value) {
            (Operator::Contains, Value::String(id)) => {
                let p = self.bind(SqlParam::Json(serde_json::json!([{ "id": id }])));
                format!("({COL} @> {p}::jsonb)")
            },
            (Operator::Contains, _) => {
                return Err(invalid("CONTAINS needs a string reference id".to_string()));
            },
            (Operator::IsNull, _) => format!("({COL} IS NULL OR {COL} = '[]'::jsonb)"),
            (Operator::IsNotNull, _) => format!("({COL} IS NOT NULL AND {COL} <> '[]'::jsonb)"),
            (other, _) => return Err(unsupported(other)),
        })
    }

    fn metadata(&mut self, op: Operator, value: &Value) -> Result<String> {
        const EMPTY: &str = "(metadata IS NULL OR metadata = '{}'::jsonb)";
        Ok(match (op, value) {
            (Operator::Eq, Value::Map(wanted)) if wanted.is_empty() => EMPTY.to_string(),
            (Operator::Ne, Value::Map(wanted)) if wanted.is_empty() => format!("(NOT {EMPTY})"),
            (Operator::Contains, Value::Map(wanted)) if wanted.is_empty() => "FALSE".to_string(),
            (Operator::Eq, Value::Map(wanted)) => self.metadata_pairs(wanted, "=", " AND "),
            (Operator::Ne, Value::Map(wanted)) => {
                self.metadata_pairs(wanted, "IS DISTINCT FROM", " OR ")
            },
            (Operator::Contains, Value::Map(wanted)) => self.metadata_pairs(wanted, "=", " OR "),
            (Operator::Contains, Value::String(key)) => {
                let p = self.bind(SqlParam::Text(key.clone()));
                format!("(metadata ? {p})")
            },
            (Operator::IsNull, _) => EMPTY.to_string(),
            (Operator::IsNotNull, _) => format!("(NOT {EMPTY})"),
            (Operator::Eq | Operator::Ne | Operator::Contains, _) => {
                return Err(invalid(format!(
                    "{} needs a map operand",
                    op.as_str()
                )));
            },
            (other, _) => return Err(unsupported(other)),
        })
    }

    fn metadata_pairs(
        &mut self,
        pairs: &BTreeMap<String, String>,
        cmp: &str,
        joiner: &str,
    ) -> String {
        let parts: Vec<String> = pairs
            .iter()
            .map(|(k, v)| {
                let key = self.bind(SqlParam::Text(k.clone()));
                let val = self.bind(SqlParam::Text(v.clone()));
                format!("metadata->>{key}::text {cmp} {val}")
            })
            .collect();
        format!("({})", parts.join(joiner))
    }

    fn like(&mut self, col: &str, pattern: &str) -> String {
        let p = self.bind(SqlParam::Text(pattern.to_string()));
        format!("({col} LIKE {p} ESCAPE '\\')")
    }

    /// Orders a text column numerically where both sides are numbers and
    /// bytewise otherwise, row by row.
    fn ordered(&mut self, col: &str, op: Operator, value: &Value) -> String {
        let operand = value.to_string();
        let op = op.as_str();
        match parse_number(&operand) {
            Some(n) => {
                let num = self.bind(SqlParam::Float(n));
                let txt = self.bind(SqlParam::Text(operand));
                format!(
                    "(CASE WHEN {col} ~ '{NUMBER_PATTERN}' THEN {col}::float8 {op} {num} \
                     ELSE {col} COLLATE \"C\" {op} {txt} END)"
                )
            },
            None => {
                let p = self.bind(SqlParam::Text(operand));
                format!("({col} COLLATE \"C\" {op} {p})")
            },
        }
    }

    fn bind_text(&mut self, value: &Value) -> String {
        self.bind(SqlParam::Text(value.to_string()))
    }
}

fn invalid(msg: String) -> Error {
    Error::InvalidInput(msg)
}

fn unsupported(op: Operator) -> Error {
    invalid(format!("unsupported operator {}", op.as_str()))
}

fn number(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| invalid(format!("expected a number, got '{value}'")))
}

fn timestamp(value: &Value) -> Result<DateTime<Utc>> {
    value
        .as_time()
        .map(truncate_time)
        .ok_or_else(|| invalid(format!("expected an RFC 3339 timestamp, got '{value}'")))
}

fn pair(value: &Value) -> Result<(&Value, &Value)> {
    match value.as_list() {
        Some([low, high]) => Ok((low, high)),
        _ => Err(invalid("BETWEEN needs a two-element list".to_string())),
    }
}

fn list_items(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn in_list(col: &str, params: &[String]) -> String {
    if params.is_empty() {
        "FALSE".to_string()
    } else {
        format!("({col} IN ({}))", params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn cond(field: &str, op: &str, value: impl Into<Value>) -> Condition {
        Condition::new(field, op, value).unwrap()
    }

    fn compile(condition: Condition) -> (String, Vec<SqlParam>) {
        build_where_clause(&FilterGroup::and(vec![condition]), 1).unwrap()
    }

    fn text(s: &str) -> SqlParam {
        SqlParam::Text(s.to_string())
    }

    fn account() -> Uuid {
        Uuid::from_u128(0x1234)
    }

    #[test]
    fn test_search_query_defaults() {
        let q = build_search_query(&Filter::default(), account()).unwrap();
        assert_eq!(
            q.sql,
            format!(
                "SELECT {SELECT_COLUMNS} FROM knowledge_entry WHERE account_id = $1 \
                 AND is_deleted = FALSE ORDER BY id ASC"
            )
        );
        assert_eq!(q.params, vec![SqlParam::Uuid(account())]);
        assert!(q.client_sort.is_none());
    }

    #[test]
    fn test_search_query_visibility() {
        let q = build_search_query(&Filter::default().include_deleted(), account()).unwrap();
        assert!(!q.sql.contains("is_deleted"));

        let q = build_search_query(&Filter::default().only_deleted(), account()).unwrap();
        assert!(q.sql.contains(" AND is_deleted = TRUE"));
    }

    #[test]
    fn test_search_query_order_and_paging() {
        let filter = Filter::new(FilterGroup::and(vec![cond("Category", "=", "fact")]))
            .order_by("Importance", SortDirection::Desc)
            .with_limit(10)
            .with_offset(20);
        let q = build_search_query(&filter, account()).unwrap();

        assert!(q.sql.ends_with(
            " AND (COALESCE((category = $2), FALSE)) \
             ORDER BY importance DESC, id ASC LIMIT $3 OFFSET $4"
        ));
        assert_eq!(
            q.params,
            vec![
                SqlParam::Uuid(account()),
                text("fact"),
                SqlParam::Int(10),
                SqlParam::Int(20)
            ]
        );
    }

    #[test]
    fn test_search_query_time_order_nulls() {
        let filter = Filter::default().order_by("ExpiresAt", SortDirection::Asc);
        let q = build_search_query(&filter, account()).unwrap();
        assert!(q.sql.ends_with(" ORDER BY expires_at ASC NULLS FIRST, id ASC"));

        let filter = Filter::default().order_by("SourceID", SortDirection::Desc);
        let q = build_search_query(&filter, account()).unwrap();
        assert!(q.sql.ends_with(" ORDER BY source_id COLLATE \"C\" DESC, id ASC"));
    }

    #[test]
    fn test_search_query_client_side_sort() {
        let filter = Filter::default()
            .order_by("Tags", SortDirection::Desc)
            .with_limit(5)
            .with_offset(1);
        let q = build_search_query(&filter, account()).unwrap();

        assert_eq!(q.client_sort, Some((Field::Tags, SortDirection::Desc)));
        assert!(q.sql.ends_with(" ORDER BY id ASC"));
        assert!(!q.sql.contains("LIMIT"));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn test_search_query_unknown_order_field_keeps_id_order() {
        let filter = Filter::default().order_by("Colour", SortDirection::Desc).with_limit(2);
        let q = build_search_query(&filter, account()).unwrap();
        assert!(q.client_sort.is_none());
        assert!(q.sql.ends_with(" ORDER BY id ASC LIMIT $2"));
    }

    #[test]
    fn test_groups() {
        let group = FilterGroup::or(vec![cond("Category", "=", "fact")])
            .with_group(FilterGroup::not(vec![
                cond("OwnerID", "=", "bob"),
                cond("Tags", "CONTAINS", "x"),
            ]))
            .with_group(FilterGroup::default());
        let (sql, params) = build_where_clause(&group, 2).unwrap();

        assert_eq!(
            sql,
            "COALESCE((category = $2), FALSE) OR \
             (NOT COALESCE((owner_id = $3), FALSE) AND NOT COALESCE(($4 = ANY(tags)), FALSE)) OR \
             (TRUE)"
        );
        assert_eq!(params, vec![text("fact"), text("bob"), text("x")]);
    }

    #[test_case("=", "(source_id = $1)")]
    #[test_case("!=", "(source_id IS DISTINCT FROM $1)")]
    #[test_case(">=", "(source_id COLLATE \"C\" >= $1)")]
    #[test_case("LIKE", "(source_id LIKE $1)")]
    fn test_text_operators(op: &str, expected: &str) {
        let (sql, params) = compile(cond("SourceID", op, "chat"));
        assert_eq!(sql, format!("COALESCE({expected}, FALSE)"));
        assert_eq!(params, vec![text("chat")]);
    }

    #[test_case("CONTAINS", "%50\\%\\_off%")]
    #[test_case("STARTSWITH", "50\\%\\_off%")]
    #[test_case("ENDSWITH", "%50\\%\\_off")]
    fn test_like_patterns_escape_wildcards(op: &str, pattern: &str) {
        let (sql, params) = compile(cond("ContentType", op, "50%_off"));
        assert_eq!(sql, "COALESCE((content_type LIKE $1 ESCAPE '\\'), FALSE)");
        assert_eq!(params, vec![text(pattern)]);
    }

    #[test]
    fn test_text_in_between_and_null() {
        let (sql, params) = compile(cond("Category", "IN", vec!["fact", "decision"]));
        assert_eq!(sql, "COALESCE((category IN ($1, $2)), FALSE)");
        assert_eq!(params, vec![text("fact"), text("decision")]);

        let (sql, _) = compile(cond("Category", "IN", Value::List(vec![])));
        assert_eq!(sql, "COALESCE(FALSE, FALSE)");

        let (sql, _) = compile(cond("OwnerType", "BETWEEN", vec!["a", "m"]));
        assert_eq!(sql, "COALESCE((owner_type COLLATE \"C\" BETWEEN $1 AND $2), FALSE)");

        let (sql, params) = compile(Condition::with_operator("OwnerID", Operator::IsNull, Value::Null));
        assert_eq!(sql, "COALESCE((NULLIF(owner_id, '') IS NULL), FALSE)");
        assert!(params.is_empty());
    }

    #[test]
    fn test_id_compares_as_text() {
        let (sql, _) = compile(cond("ID", "=", "6a2f41a3-c54c-fce8-32d2-0324e1c32e22"));
        assert_eq!(sql, "COALESCE((id::text = $1), FALSE)");
    }

    #[test]
    fn test_importance() {
        let (sql, params) = compile(cond("Importance", ">=", 50));
        assert_eq!(sql, "COALESCE((importance::float8 >= $1), FALSE)");
        assert_eq!(params, vec![SqlParam::Float(50.0)]);

        let (sql, params) = compile(cond("Importance", "CONTAINS", 5));
        assert_eq!(sql, "COALESCE((importance::text LIKE $1 ESCAPE '\\'), FALSE)");
        assert_eq!(params, vec![text("%5%")]);

        let (sql, params) = compile(cond("Importance", ">", "high"));
        assert_eq!(sql, "COALESCE((importance::text COLLATE \"C\" > $1), FALSE)");
        assert_eq!(params, vec![text("high")]);
    }

    #[test]
    fn test_importance_equality_uses_string_form() {
        let (sql, params) = compile(cond("Importance", "=", "75.0"));
        assert_eq!(sql, "COALESCE((importance::text = $1), FALSE)");
        assert_eq!(params, vec![text("75.0")]);

        let (sql, params) = compile(cond("Importance", "!=", 75));
        assert_eq!(sql, "COALESCE((importance::text IS DISTINCT FROM $1), FALSE)");
        assert_eq!(params, vec![text("75")]);

        let (_, params) = compile(cond("Importance", "=", Value::Float(75.0)));
        assert_eq!(params, vec![text("75")]);
    }

    #[test]
    fn test_text_ordering_with_numeric_operand() {
        let (sql, params) = compile(cond("SourceID", ">", "9"));
        assert_eq!(
            sql,
            format!(
                "COALESCE((CASE WHEN source_id ~ '{NUMBER_PATTERN}' THEN source_id::float8 > $1 \
                 ELSE source_id COLLATE \"C\" > $2 END), FALSE)"
            )
        );
        assert_eq!(params, vec![SqlParam::Float(9.0), text("9")]);

        let (sql, params) = compile(cond("OwnerID", "<=", "bob"));
        assert_eq!(sql, "COALESCE((owner_id COLLATE \"C\" <= $1), FALSE)");
        assert_eq!(params, vec![text("bob")]);
    }

    #[test]
    fn test_time() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let (sql, params) = compile(cond("CreatedAt", "<", t));
        assert_eq!(sql, "COALESCE((created_at < $1), FALSE)");
        assert_eq!(params, vec![SqlParam::Time(t)]);

        let (sql, params) = compile(cond("ExpiresAt", "!=", "2024-06-01T00:00:00Z"));
        assert_eq!(sql, "COALESCE((expires_at IS DISTINCT FROM $1), FALSE)");
        assert_eq!(params, vec![SqlParam::Time(t)]);

        let (_, params) = compile(cond("CreatedAt", "=", t + chrono::Duration::nanoseconds(999)));
        assert_eq!(params, vec![SqlParam::Time(t)]);

        let (sql, _) = compile(cond("UpdatedAt", "BETWEEN", Value::List(vec![t.into(), t.into()])));
        assert_eq!(sql, "COALESCE((updated_at BETWEEN $1 AND $2), FALSE)");

        for bad in [
            cond("CreatedAt", "=", "yesterday"),
            cond("CreatedAt", "CONTAINS", t),
            cond("CreatedAt", "BETWEEN", Value::List(vec![t.into()])),
        ] {
            assert!(build_where_clause(&FilterGroup::and(vec![bad]), 1).is_err());
        }
    }

    #[test]
    fn test_content() {
        let (sql, params) = compile(cond("Content", "CONTAINS", "prod"));
        assert_eq!(sql, "COALESCE((position($1::bytea in content) > 0), FALSE)");
        assert_eq!(params, vec![SqlParam::Bytes(b"prod".to_vec())]);

        let (sql, _) = compile(cond("Content", "!=", Value::Bytes(vec![1, 2])));
        assert_eq!(sql, "COALESCE((content IS DISTINCT FROM $1), FALSE)");

        assert!(build_where_clause(&FilterGroup::and(vec![cond("Content", ">", "a")]), 1).is_err());
    }

    #[test]
    fn test_lists() {
        let (sql, params) = compile(cond("SubjectIDs", "CONTAINS", "api"));
        assert_eq!(sql, "COALESCE(($1 = ANY(subject_ids)), FALSE)");
        assert_eq!(params, vec![text("api")]);

        let (sql, params) = compile(cond("Tags", "CONTAINS", vec!["a", "b"]));
        assert_eq!(sql, "COALESCE((tags @> $1::text[]), FALSE)");
        assert_eq!(
            params,
            vec![SqlParam::TextArray(vec!["a".to_string(), "b".to_string()])]
        );

        assert!(build_where_clause(&FilterGroup::and(vec![cond("Tags", "=", "a")]), 1).is_err());
    }

    #[test]
    fn test_references() {
        let (sql, params) = compile(cond("References", "CONTAINS", "r0"));
        assert_eq!(sql, "COALESCE((\"references\" @> $1::jsonb), FALSE)");
        assert_eq!(params, vec![SqlParam::Json(serde_json::json!([{ "id": "r0" }]))]);

        assert!(
            build_where_clause(&FilterGroup::and(vec![cond("References", "CONTAINS", 5)]), 1)
                .is_err()
        );
    }

    #[test]
    fn test_metadata() {
        let (sql, params) = compile(cond("Metadata", "=", [("env", "prod"), ("region", "eu")]));
        assert_eq!(
            sql,
            "COALESCE((metadata->>$1::text = $2 AND metadata->>$3::text = $4), FALSE)"
        );
        assert_eq!(params, vec![text("env"), text("prod"), text("region"), text("eu")]);

        let (sql, _) = compile(cond("Metadata", "!=", [("env", "prod")]));
        assert_eq!(sql, "COALESCE((metadata->>$1::text IS DISTINCT FROM $2), FALSE)");

        let (sql, _) = compile(cond("Metadata", "CONTAINS", [("a", "1"), ("b", "2")]));
        assert_eq!(sql, "COALESCE((metadata->>$1::text = $2 OR metadata->>$3::text = $4), FALSE)");

        let (sql, params) = compile(cond("Metadata", "CONTAINS", "env"));
        assert_eq!(sql, "COALESCE((metadata ? $1), FALSE)");
        assert_eq!(params, vec![text("env")]);

        let (sql, _) = compile(cond("Metadata", "=", Value::Map(BTreeMap::new())));
        assert_eq!(
            sql,
            "COALESCE((metadata IS NULL OR metadata = '{}'::jsonb), FALSE)"
        );

        assert!(build_where_clause(&FilterGroup::and(vec![cond("Metadata", "=", "x")]), 1).is_err());
    }

    #[test]
    fn test_metadata_keys_never_reach_sql_text() {
        let hostile = "x') OR 1=1; DROP TABLE knowledge_entry; --";
        let (sql, params) = compile(cond("Metadata", "=", [(hostile, "v")]));
        assert!(!sql.contains("DROP"));
        assert!(!sql.contains('\''));
        assert_eq!(params[0], text(hostile));
    }

    #[test]
    fn test_text_values_never_reach_sql_text() {
        let hostile = "'; DELETE FROM knowledge_entry; --";
        for op in ["=", "!=", "<", "CONTAINS", "STARTSWITH", "IN"] {
            let (sql, _) = compile(cond("OwnerID", op, hostile));
            assert!(!sql.contains("DELETE"), "{op}: {sql}");
        }
    }

    #[test]
    fn test_unknown_field_and_operator_fail_closed() {
        let err = build_where_clause(&FilterGroup::and(vec![cond("Colour", "=", "red")]), 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid input: unknown field 'Colour'");

        let err = build_where_clause(&FilterGroup::and(vec![cond("Tags", "LIKE", "a%")]), 1)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid input: Tags: unsupported operator LIKE");
    }

    #[test]
    fn test_empty_root_is_true() {
        let (sql, params) = build_where_clause(&FilterGroup::default(), 1).unwrap();
        assert_eq!(sql, "TRUE");
        assert!(params.is_empty());
    }
}
