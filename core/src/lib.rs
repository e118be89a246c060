//! Howell Bridge core library
//!
//! Domain models, the error taxonomy, business-rule validation, the
//! store trait interfaces, and the configuration document for the
//! Howell coordination daemon. No I/O lives here; every other crate in
//! the workspace builds on the types defined in this one.
//!
//! # Modules
//!
//! - [`models`] - task, knowledge-graph, agent-stratigraphy, instance
//!   and session-log record types
//! - [`error`] - `HowellError` taxonomy and the crate-wide `Result` alias
//! - [`repository`] - the four store traits (`KnowledgeGraphStore`,
//!   `TaskStore`, `StratigraphyStore`, `InstanceRegistry`) plus `SessionLog`
//! - [`validation`] - scope-overlap predicate, field validators, template
//!   catalog
//! - [`config`] - the daemon's configuration document
//! - [`coordinator`] - the `Coordinator`, the single shared-state value
//!   every handler, worker and tool dispatcher is given a handle to

pub mod config;
pub mod coordinator;
pub mod error;
pub mod models;
pub mod repository;
pub mod validation;

pub use config::Config;
pub use coordinator::Coordinator;
pub use error::{HowellError, Result};
pub use models::{
    AgentRecord, CreateFromTemplate, Entity, FileConflict, Handoff, HandoffPriority, Instance,
    KnowledgeGraph, NewTask, Note, NoteCategory, ProgressNote, Relation, SessionLogEntry, Task,
    TaskFilter, TaskPriority, TaskScope, TaskStatus, TaskTemplate,
};
pub use repository::{
    AgentWithNotes, BootstrapContext, InstanceRegistry, KnowledgeGraphStore, SessionLog,
    StratigraphyStore, TaskStore,
};
pub use validation::Validator;

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_constants_present() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "howell-core");
    }
}
