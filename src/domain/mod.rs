//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod maintenance;
pub mod recurrence;
pub mod types;
