//! In-process query engine.
//!
//! Evaluates filters, sorts and paginates entries for the in-memory and file
//! backends. The PostgreSQL backend compiles the same filters to SQL and only
//! reuses the sorter for fields the database cannot order.

pub mod comparator;
pub mod evaluator;
pub mod field;
pub mod sorter;

pub use comparator::compare;
pub use evaluator::{condition_matches, matches};
pub use field::{Field, FieldValue};
pub use sorter::{paginate, sort_and_paginate, sort_entries};
