//! Document-store repositories.

pub mod opted_account;
pub mod report_cache;

pub use opted_account::{OptedAccountStore, PgOptedAccountStore};
pub use report_cache::{cache_key, CacheEntry, PgReportCache, ReportCacheStore};
