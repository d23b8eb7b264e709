//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod cached_report;
pub mod opted_account;

pub use cached_report::CachedReportEntity;
pub use opted_account::OptedAccountEntity;
