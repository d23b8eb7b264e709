//! Report cache repository.
//!
//! Two independent instances exist, one per cache namespace (ad hoc and
//! weekly), with identical contract and disjoint tables. Keys are a pure
//! function of the request parameters; any permutation of the same user
//! set yields the same key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use domain::models::{Report, UserRef};
use shared::crypto::sha256_hex;

use crate::entities::CachedReportEntity;
use crate::error::PersistenceError;

/// Derives the deterministic cache key for a report request.
///
/// Users are sorted by id ascending before concatenation, which is what
/// guarantees order-independence across permutations of the same set.
pub fn cache_key(org: &str, org_id: i64, users: &[UserRef], start_date: &str, end_date: &str) -> String {
    let mut sorted: Vec<&UserRef> = users.iter().collect();
    sorted.sort_by_key(|user| user.id);

    let user_part = sorted
        .iter()
        .map(|user| format!("{}:{}", user.id, user.name))
        .collect::<Vec<_>>()
        .join(",");

    let key_data = format!("{org}|{org_id}|{user_part}|{start_date}|{end_date}");
    sha256_hex(&key_data)
}

/// One cached report with its request parameters and access metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub cache_key: String,
    pub org: String,
    pub org_id: i64,
    pub users: Vec<UserRef>,
    pub start_date: String,
    pub end_date: String,
    pub report: Report,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    /// Builds a fresh entry for the given request parameters, deriving its
    /// key and stamping both timestamps with the current instant.
    pub fn new(
        org: &str,
        org_id: i64,
        users: Vec<UserRef>,
        start_date: &str,
        end_date: &str,
        report: Report,
    ) -> Self {
        let now = Utc::now();
        Self {
            cache_key: cache_key(org, org_id, &users, start_date, end_date),
            org: org.to_string(),
            org_id,
            users,
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            report,
            created_at: now,
            last_accessed: now,
        }
    }
}

impl From<CachedReportEntity> for CacheEntry {
    fn from(entity: CachedReportEntity) -> Self {
        CacheEntry {
            cache_key: entity.cache_key,
            org: entity.org,
            org_id: entity.org_id,
            users: entity.users.0,
            start_date: entity.start_date,
            end_date: entity.end_date,
            report: entity.report.0,
            created_at: entity.created_at,
            last_accessed: entity.last_accessed,
        }
    }
}

/// Storage contract of one report-cache namespace.
#[async_trait]
pub trait ReportCacheStore: Send + Sync {
    /// Looks up a cached report. `None` means a miss.
    async fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>, PersistenceError>;

    /// Stores an entry, fully replacing any existing entry under its key.
    async fn put(&self, entry: CacheEntry) -> Result<(), PersistenceError>;

    /// Removes an entry. Deleting an absent key is not an error.
    async fn delete(&self, cache_key: &str) -> Result<(), PersistenceError>;

    /// Best-effort access-time bump for a cache hit.
    async fn touch_last_accessed(&self, cache_key: &str) -> Result<(), PersistenceError>;
}

/// PostgreSQL-backed report cache over one namespace table.
#[derive(Debug, Clone)]
pub struct PgReportCache {
    pool: PgPool,
    table: &'static str,
}

impl PgReportCache {
    /// The ad hoc report cache namespace.
    pub fn ad_hoc(pool: PgPool) -> Self {
        Self {
            pool,
            table: "report_cache",
        }
    }

    /// The weekly report cache namespace.
    pub fn weekly(pool: PgPool) -> Self {
        Self {
            pool,
            table: "weekly_report_cache",
        }
    }
}

#[async_trait]
impl ReportCacheStore for PgReportCache {
    async fn get(&self, cache_key: &str) -> Result<Option<CacheEntry>, PersistenceError> {
        let entity = sqlx::query_as::<_, CachedReportEntity>(&format!(
            r#"
            SELECT cache_key, org, org_id, users, start_date, end_date,
                   report, created_at, last_accessed
            FROM {}
            WHERE cache_key = $1
            "#,
            self.table
        ))
        .bind(cache_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entity.map(CacheEntry::from))
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), PersistenceError> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (cache_key, org, org_id, users, start_date, end_date,
                            report, created_at, last_accessed)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (cache_key) DO UPDATE SET
                org = EXCLUDED.org,
                org_id = EXCLUDED.org_id,
                users = EXCLUDED.users,
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date,
                report = EXCLUDED.report,
                created_at = EXCLUDED.created_at,
                last_accessed = EXCLUDED.last_accessed
            "#,
            self.table
        ))
        .bind(&entry.cache_key)
        .bind(&entry.org)
        .bind(entry.org_id)
        .bind(Json(&entry.users))
        .bind(&entry.start_date)
        .bind(&entry.end_date)
        .bind(Json(&entry.report))
        .bind(entry.created_at)
        .bind(entry.last_accessed)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, cache_key: &str) -> Result<(), PersistenceError> {
        sqlx::query(&format!("DELETE FROM {} WHERE cache_key = $1", self.table))
            .bind(cache_key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn touch_last_accessed(&self, cache_key: &str) -> Result<(), PersistenceError> {
        sqlx::query(&format!(
            "UPDATE {} SET last_accessed = NOW() WHERE cache_key = $1",
            self.table
        ))
        .bind(cache_key)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
