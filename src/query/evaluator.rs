//! Recursive evaluation of filter groups against entries.

use super::comparator::compare;
use super::field::{Field, FieldValue};
use crate::models::{Condition, Entry, FilterGroup, GroupOperator, Operator, Value};
use std::collections::BTreeMap;

/// Returns true if the entry satisfies the group.
///
/// An empty group matches everything. `AND` needs every child true, `OR` any
/// child, and `NOT` negates a single child or, with several children,
/// requires that none match.
#[must_use]
pub fn matches(entry: &Entry, group: &FilterGroup) -> bool {
    if group.is_empty() {
        return true;
    }

    let mut results = group
        .conditions
        .iter()
        .map(|c| condition_matches(entry, c))
        .chain(group.groups.iter().map(|g| matches(entry, g)));

    match group.operator {
        GroupOperator::And => {
            let mut any = false;
            for result in results {
                if !result {
                    return false;
                }
                any = true;
            }
            any
        },
        GroupOperator::Or => results.any(|r| r),
        GroupOperator::Not => {
            let results: Vec<bool> = results.collect();
            match results.as_slice() {
                [single] => !single,
                many => many.iter().all(|r| !r),
            }
        },
    }
}

/// Evaluates one condition. Unknown fields never match.
#[must_use]
pub fn condition_matches(entry: &Entry, condition: &Condition) -> bool {
    let Some(field) = Field::parse(&condition.field) else {
        return false;
    };

    match field.value(entry) {
        FieldValue::Metadata(metadata) => {
            metadata_matches(metadata, condition.operator, &condition.value)
        },
        FieldValue::List(items) => list_contains(items, condition.operator, &condition.value),
        FieldValue::References(refs) => {
            condition.operator == Operator::Contains
                && match &condition.value {
                    Value::String(id) => refs.iter().any(|r| &r.id == id),
                    _ => false,
                }
        },
        scalar => compare(&scalar, condition.operator, &condition.value),
    }
}

fn metadata_matches(metadata: &BTreeMap<String, String>, op: Operator, value: &Value) -> bool {
    match (op, value) {
        (Operator::Eq, Value::Map(wanted)) => metadata_equals(metadata, wanted),
        (Operator::Ne, Value::Map(wanted)) => !metadata_equals(metadata, wanted),
        (Operator::Contains, Value::Map(wanted)) => wanted
            .iter()
            .any(|(k, v)| metadata.get(k).is_some_and(|stored| stored == v)),
        (Operator::Contains, Value::String(key)) => metadata.contains_key(key),
        _ => false,
    }
}

fn metadata_equals(metadata: &BTreeMap<String, String>, wanted: &BTreeMap<String, String>) -> bool {
    if wanted.is_empty() {
        return metadata.is_empty();
    }
    wanted
        .iter()
        .all(|(k, v)| metadata.get(k).is_some_and(|stored| stored == v))
}

fn list_contains(items: &[String], op: Operator, value: &Value) -> bool {
    if op != Operator::Contains {
        return false;
    }
    match value {
        Value::List(wanted) => wanted.iter().all(|w| {
            let w = w.to_string();
            items.iter().any(|item| *item == w)
        }),
        other => {
            let wanted = other.to_string();
            items.iter().any(|item| *item == wanted)
        },
    }
}
