//! Shared utilities and common types for the Worktrace report backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Content hashing (cache key derivation)
//! - Common validation logic for request payloads

pub mod crypto;
pub mod validation;
