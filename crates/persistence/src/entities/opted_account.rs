//! Weekly-report opt-in entity.

use chrono::{DateTime, Utc};
use domain::models::{OptedAccount, UserRef};
use sqlx::types::Json;
use sqlx::FromRow;

/// One weekly-report opt-in row, unique per (account_id, org_id).
#[derive(Debug, Clone, FromRow)]
pub struct OptedAccountEntity {
    pub account_id: i64,
    pub org_id: i64,
    pub org_name: String,
    pub email: String,
    pub users: Json<Vec<UserRef>>,
    pub opted_in_at: DateTime<Utc>,
    pub next_trigger_time: Option<DateTime<Utc>>,
}

impl From<OptedAccountEntity> for OptedAccount {
    fn from(entity: OptedAccountEntity) -> Self {
        OptedAccount {
            account_id: entity.account_id,
            org_id: entity.org_id,
            org_name: entity.org_name,
            email: entity.email,
            users: entity.users.0,
            opted_in_at: entity.opted_in_at,
            next_trigger_time: entity.next_trigger_time,
        }
    }
}
