//! Domain layer for the Worktrace report backend.
//!
//! This crate contains:
//! - Domain models (Task, Report, OptedAccount, telemetry rows)
//! - Request payloads with validation
//! - Calendar-week math shared by the pipeline and the scheduler

pub mod models;
pub mod week;
