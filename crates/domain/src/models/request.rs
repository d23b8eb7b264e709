//! Report generation and weekly opt-in request payloads.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use shared::validation::{validate_date_range, validate_date_str};

/// A user covered by a report request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: i64,
    pub name: String,
}

/// Request to generate an ad hoc report over an arbitrary date range.
///
/// The user list is order-insensitive: permutations of the same users are
/// the same request as far as caching is concerned.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_report_request"))]
pub struct ReportRequest {
    #[serde(default)]
    pub account_id: i64,
    #[serde(default)]
    pub org_id: i64,
    pub org: String,
    #[validate(length(min = 1, message = "At least one user is required"))]
    pub users: Vec<UserRef>,
    /// YYYY-MM-DD
    #[validate(custom(function = "validate_date_field"))]
    pub start_date: String,
    /// YYYY-MM-DD
    #[validate(custom(function = "validate_date_field"))]
    pub end_date: String,
}

/// Request to generate a weekly report.
///
/// `week_start_date` may be any day of the target week; the pipeline snaps
/// it to that week's Monday-Sunday bounds.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReportRequest {
    #[serde(default)]
    pub account_id: i64,
    #[serde(default)]
    pub org_id: i64,
    pub org: String,
    #[validate(length(min = 1, message = "At least one user is required"))]
    pub users: Vec<UserRef>,
    /// YYYY-MM-DD
    #[validate(custom(function = "validate_date_field"))]
    pub week_start_date: String,
}

/// Request to opt an (account, org) pair into scheduled weekly reports.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptInRequest {
    pub account_id: i64,
    pub org_id: i64,
    pub org_name: String,
    #[validate(email(message = "Recipient email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "At least one user is required"))]
    pub users: Vec<UserRef>,
    /// Optional RFC 3339 override for the first trigger instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_trigger_time: Option<String>,
}

/// Request to opt an (account, org) pair out of scheduled weekly reports.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptOutRequest {
    pub account_id: i64,
    pub org_id: i64,
}

/// Manual trigger: generate and deliver one weekly report immediately,
/// without touching the recurring schedule.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySendRequest {
    pub account_id: i64,
    pub org_id: i64,
    pub org_name: String,
    #[validate(email(message = "Recipient email is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "At least one user is required"))]
    pub users: Vec<UserRef>,
    /// YYYY-MM-DD
    #[validate(custom(function = "validate_date_field"))]
    pub week_start_date: String,
}

fn validate_date_field(value: &str) -> Result<(), ValidationError> {
    validate_date_str(value)
}

fn validate_report_request(request: &ReportRequest) -> Result<(), ValidationError> {
    validate_date_range(&request.start_date, &request.end_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ReportRequest {
        ReportRequest {
            account_id: 0,
            org_id: 3,
            org: "Turbo".to_string(),
            users: vec![UserRef {
                id: 1,
                name: "ben".to_string(),
            }],
            start_date: "2025-11-17".to_string(),
            end_date: "2025-11-23".to_string(),
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_user_list() {
        let mut req = request();
        req.users.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_date_format() {
        let mut req = request();
        req.start_date = "17/11/2025".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_range() {
        let mut req = request();
        req.start_date = "2025-11-23".to_string();
        req.end_date = "2025-11-17".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_opt_in_rejects_bad_email() {
        let req = OptInRequest {
            account_id: 7,
            org_id: 3,
            org_name: "Turbo".to_string(),
            email: "not-an-email".to_string(),
            users: vec![UserRef {
                id: 1,
                name: "ben".to_string(),
            }],
            next_trigger_time: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_deserializes_camel_case() {
        let json = r#"{
            "accountId": 0,
            "orgId": 3,
            "org": "Turbo",
            "users": [{"id": 1, "name": "ben"}],
            "startDate": "2025-11-19",
            "endDate": "2025-11-19"
        }"#;
        let req: ReportRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.org, "Turbo");
        assert_eq!(req.users[0].name, "ben");
        assert!(req.validate().is_ok());
    }
}
