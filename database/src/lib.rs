//! Howell Bridge store implementations
//!
//! Concrete, I/O-performing implementations of the four store traits
//! defined in `howell-core`: a JSON-file knowledge graph store, a
//! JSON-file task store, a SQLite agent-stratigraphy store, an
//! in-memory instance registry, and a capped JSON session log.
//!
//! Every durable store follows the same discipline: load the whole
//! document, mutate it behind the store's own mutex, write it back
//! atomically (temp file + rename) with one rolling backup. A corrupt
//! primary falls back to the backup; if both are corrupt the store
//! resets to empty rather than crashing the daemon (spec.md §7,
//! `CorruptStore`).

pub mod atomic_file;
mod instance_registry;
mod kg_store;
mod session_log;
mod sqlite_stratigraphy;
mod task_store;

pub use instance_registry::InMemoryInstanceRegistry;
pub use kg_store::JsonKnowledgeGraphStore;
pub use session_log::JsonSessionLog;
pub use sqlite_stratigraphy::SqliteStratigraphyStore;
pub use task_store::JsonTaskStore;

pub use howell_core::{
    error::{HowellError, Result},
    repository::{BootstrapContext, InstanceRegistry, KnowledgeGraphStore, SessionLog, StratigraphyStore, TaskStore},
};
