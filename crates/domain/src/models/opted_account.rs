//! Weekly-report opt-in record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::UserRef;

/// An (account, org) pair subscribed to scheduled weekly reports.
///
/// At most one record exists per pair; opting in again overwrites the
/// previous record. Deleted on opt-out and read back at process start to
/// rebuild the scheduler's job set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptedAccount {
    pub account_id: i64,
    pub org_id: i64,
    pub org_name: String,
    /// Recipient of the weekly delivery.
    pub email: String,
    /// Users covered by the weekly report.
    pub users: Vec<UserRef>,
    pub opted_in_at: DateTime<Utc>,
    /// Optional override for the recurring trigger instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_trigger_time: Option<DateTime<Utc>>,
}

impl OptedAccount {
    /// The registry key of this record.
    pub fn key(&self) -> (i64, i64) {
        (self.account_id, self.org_id)
    }
}
