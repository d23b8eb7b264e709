//! Cached report entity.

use chrono::{DateTime, Utc};
use domain::models::{Report, UserRef};
use sqlx::types::Json;
use sqlx::FromRow;

/// One cached report document, keyed by its deterministic cache key.
///
/// The same shape backs both cache namespaces (ad hoc and weekly); they
/// live in separate tables so structurally identical keys never collide
/// across report kinds.
#[derive(Debug, Clone, FromRow)]
pub struct CachedReportEntity {
    pub cache_key: String,
    pub org: String,
    pub org_id: i64,
    pub users: Json<Vec<UserRef>>,
    pub start_date: String,
    pub end_date: String,
    pub report: Json<Report>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}
