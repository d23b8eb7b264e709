//! Persistence layer for the Worktrace report backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Document-store repositories for the report caches and the
//!   weekly-report opt-in collection

pub mod db;
pub mod entities;
pub mod error;
pub mod repositories;

pub use error::PersistenceError;
