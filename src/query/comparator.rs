//! Type-aware comparison of a field value against a condition operand.

use super::field::FieldValue;
use crate::models::{Operator, Value, truncate_time};
use std::cmp::Ordering;

/// Compares a field against an operand.
///
/// Timestamps compare chronologically at microsecond precision when the
/// operand is a time or an RFC 3339 string; an unset timestamp only matches
/// `!=`. Content bytes
/// compare as text for `=`, `!=` and `CONTAINS`. Everything else compares the
/// string forms, numerically when both parse as numbers.
///
/// Operators that have no meaning for the operand return `false`.
#[must_use]
pub fn compare(field: &FieldValue<'_>, op: Operator, value: &Value) -> bool {
    if let FieldValue::Time(stored) = field {
        if let Some(wanted) = value.as_time() {
            return match stored {
                Some(stored) => {
                    ordering_matches(truncate_time(*stored).cmp(&truncate_time(wanted)), op)
                },
                None => op == Operator::Ne,
            };
        }
    }

    if let FieldValue::Bytes(stored) = field {
        let wanted = match value {
            Value::Bytes(b) => Some(b.as_slice()),
            Value::String(s) => Some(s.as_bytes()),
            _ => None,
        };
        if let Some(wanted) = wanted {
            match op {
                Operator::Eq => return *stored == wanted,
                Operator::Ne => return *stored != wanted,
                Operator::Contains => return contains_bytes(stored, wanted),
                _ => {},
            }
        }
    }

    compare_strings(&field.to_string(), op, &value.to_string())
}

/// Pattern a stored string must match to order numerically in SQL.
///
/// Accepts exactly the strings [`parse_number`] accepts.
pub const NUMBER_PATTERN: &str = "^[+-]?([0-9]+([.][0-9]*)?|[.][0-9]+)([eE][+-]?[0-9]+)?$";

/// Parses a decimal number: optional sign, digits with an optional fraction,
/// optional exponent. No surrounding whitespace, no `inf` or `nan`.
#[must_use]
pub fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty()
        || !s
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Compares two string forms.
///
/// Ordering operators compare numerically when both sides are numbers in the
/// [`parse_number`] sense, bytewise otherwise.
#[must_use]
pub fn compare_strings(left: &str, op: Operator, right: &str) -> bool {
    match op {
        Operator::Eq => left == right,
        Operator::Ne => left != right,
        Operator::Contains => left.contains(right),
        Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
            let ordering = match (parse_number(left), parse_number(right)) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => Some(left.cmp(right)),
            };
            ordering.is_some_and(|o| ordering_matches(o, op))
        },
        _ => false,
    }
}

fn ordering_matches(ordering: Ordering, op: Operator) -> bool {
    match op {
        Operator::Eq => ordering == Ordering::Equal,
        Operator::Ne => ordering != Ordering::Equal,
        Operator::Gt => ordering == Ordering::Greater,
        Operator::Lt => ordering == Ordering::Less,
        Operator::Ge => ordering != Ordering::Less,
        Operator::Le => ordering != Ordering::Greater,
        _ => false,
    }
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}
