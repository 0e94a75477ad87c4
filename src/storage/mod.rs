//! Storage backends.
//!
//! Every backend implements [`KnowledgeStore`]:
//! - [`MemoryStore`]: volatile
//! - [`FileStore`]: one JSON document, flushed atomically
//! - [`PgStore`]: PostgreSQL (feature `postgres`)
//!
//! Memory and file backends share [`records::RecordSet`], so their lifecycle
//! and query behavior cannot drift apart.

// Pooled connections and lock guards are held for a whole operation.
#![allow(clippy::significant_drop_tightening)]

pub mod factory;
pub mod file;
pub mod memory;
pub mod metrics;
pub mod migrations;
pub mod postgresql;
pub mod records;
pub mod traits;

pub use factory::create_store;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use postgresql::PgStore;
pub use records::RecordSet;
pub use traits::KnowledgeStore;
