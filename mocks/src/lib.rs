//! Test support for the coordination engine: in-memory fakes of every
//! store trait, fluent builders for the model types, and a handful of
//! ready-made fixtures.

pub mod builders;
pub mod fakes;
pub mod fixtures;

pub use builders::*;
pub use fakes::{FakeInstanceRegistry, FakeKnowledgeGraphStore, FakeSessionLog, FakeStratigraphyStore, FakeTaskStore};
pub use fixtures::*;
