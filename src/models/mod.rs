//! Data models for knowstore.
//!
//! Entries are the stored records; filters describe which entries a search
//! returns and in what order.

mod entry;
mod filter;
mod value;

pub use entry::{
    Category, Entry, Reference, TIMESTAMP_DIGITS, content_types, importance, truncate_time,
};
pub use filter::{Condition, Filter, FilterGroup, GroupOperator, Operator, SortDirection};
pub use value::Value;
