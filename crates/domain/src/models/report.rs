//! Generated productivity report tree.
//!
//! The shape below is the contract with the generation engine: the engine
//! is asked for exactly this structure and its output is rejected unless
//! it parses and passes [`Report::validate`]. Reports are immutable once
//! attached to a task or a cache entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Hours in a day; every daily report carries exactly this many slots.
pub const HOURS_PER_DAY: usize = 24;

/// A complete generated report covering one or more organizations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub organizations: Vec<Organization>,
    /// ISO 8601 generation timestamp.
    pub generated_at: String,
    pub period_analyzed: Period,
}

/// The day-granularity period a report covers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    /// YYYY-MM-DD
    pub start_date: String,
    /// YYYY-MM-DD
    pub end_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub organization_name: String,
    pub users: Vec<UserReport>,
    /// Comparative rankings; only present when the report covers 2+ users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_ranking: Option<UserRanking>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserReport {
    pub user_name: String,
    pub overall_report: OverallReport,
    pub daily_reports: Vec<DailyReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverallReport {
    pub period_start: String,
    pub period_end: String,
    pub total_active_hours: f64,
    pub total_active_minutes: f64,
    pub total_afk_hours: f64,
    pub total_afk_minutes: f64,
    pub average_daily_active_hours: f64,
    pub average_daily_active_minutes: f64,
    pub total_discrepancies: i64,
    pub critical_discrepancies: i64,
    pub summary: String,
    pub conclusion: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    /// YYYY-MM-DD
    pub date: String,
    pub hourly_breakdown: Vec<HourlyBreakdown>,
    pub total_active_minutes: f64,
    pub total_active_hours: f64,
    pub total_afk_minutes: f64,
    pub total_afk_hours: f64,
    #[serde(default)]
    pub notable_discrepancies: Vec<Discrepancy>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HourlyBreakdown {
    /// 0-23
    pub hour: u8,
    /// HH:MM
    pub start_time: String,
    /// HH:MM
    pub end_time: String,
    pub active_minutes: f64,
    pub afk_minutes: f64,
    #[serde(default)]
    pub app_usage: Vec<AppUsage>,
    /// Always 60.
    pub total_minutes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppUsage {
    pub app_name: String,
    pub duration_minutes: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub window_titles: Vec<String>,
}

/// An anomalous time-use pattern flagged by the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    /// Discrepancy kind, e.g. "extended_afk" or "social_media".
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    /// HH:MM
    pub start_time: String,
    /// HH:MM
    pub end_time: String,
    pub duration_minutes: f64,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Comparative rankings across the users of one organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRanking {
    /// Sorted by rank, best first.
    pub rankings: Vec<UserRank>,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRank {
    pub user_name: String,
    /// 1 = best.
    pub rank: usize,
    pub total_active_hours: f64,
    pub average_daily_active_hours: f64,
    pub total_afk_hours: f64,
    /// totalActive / (totalActive + totalAfk) * 100
    pub active_percentage: f64,
    pub total_discrepancies: i64,
    pub critical_discrepancies: i64,
}

/// Structural violations in a generated report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportShapeError {
    #[error("report contains no organizations")]
    NoOrganizations,

    #[error("organization {org} contains no users")]
    NoUsers { org: String },

    #[error("user {user} daily report {date} has {slots} hourly slots, expected 24")]
    WrongSlotCount {
        user: String,
        date: String,
        slots: usize,
    },

    #[error("user {user} daily report {date} slot {index} carries hour {hour}")]
    MisorderedHours {
        user: String,
        date: String,
        index: usize,
        hour: u8,
    },
}

impl Report {
    /// Validates the structural invariants of a generated report.
    ///
    /// Every daily report must carry exactly 24 hourly slots, in order,
    /// with hour indices 0-23. Text content is not inspected.
    pub fn validate(&self) -> Result<(), ReportShapeError> {
        if self.organizations.is_empty() {
            return Err(ReportShapeError::NoOrganizations);
        }

        for org in &self.organizations {
            if org.users.is_empty() {
                return Err(ReportShapeError::NoUsers {
                    org: org.organization_name.clone(),
                });
            }
            for user in &org.users {
                for daily in &user.daily_reports {
                    if daily.hourly_breakdown.len() != HOURS_PER_DAY {
                        return Err(ReportShapeError::WrongSlotCount {
                            user: user.user_name.clone(),
                            date: daily.date.clone(),
                            slots: daily.hourly_breakdown.len(),
                        });
                    }
                    for (index, slot) in daily.hourly_breakdown.iter().enumerate() {
                        if slot.hour as usize != index {
                            return Err(ReportShapeError::MisorderedHours {
                                user: user.user_name.clone(),
                                date: daily.date.clone(),
                                index,
                                hour: slot.hour,
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Computes comparative rankings for an organization's users.
///
/// Returns `None` for fewer than two users. Ordering criteria, most
/// significant first: active percentage, total active hours, average daily
/// active hours, then fewer total and fewer critical discrepancies. Tied
/// users share a rank.
pub fn compute_user_rankings(users: &[UserReport]) -> Option<UserRanking> {
    if users.len() < 2 {
        return None;
    }

    let mut rankings: Vec<UserRank> = users
        .iter()
        .map(|user| {
            let overall = &user.overall_report;
            let total_time = overall.total_active_hours + overall.total_afk_hours;
            let active_percentage = if total_time > 0.0 {
                overall.total_active_hours / total_time * 100.0
            } else {
                0.0
            };
            UserRank {
                user_name: user.user_name.clone(),
                rank: 0,
                total_active_hours: overall.total_active_hours,
                average_daily_active_hours: overall.average_daily_active_hours,
                total_afk_hours: overall.total_afk_hours,
                active_percentage,
                total_discrepancies: overall.total_discrepancies,
                critical_discrepancies: overall.critical_discrepancies,
            }
        })
        .collect();

    rankings.sort_by(|a, b| {
        b.active_percentage
            .partial_cmp(&a.active_percentage)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.total_active_hours
                    .partial_cmp(&a.total_active_hours)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(
                b.average_daily_active_hours
                    .partial_cmp(&a.average_daily_active_hours)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.total_discrepancies.cmp(&b.total_discrepancies))
            .then(a.critical_discrepancies.cmp(&b.critical_discrepancies))
    });

    let mut current_rank = 1;
    for i in 0..rankings.len() {
        if i > 0 {
            let (prev, curr) = (&rankings[i - 1], &rankings[i]);
            let tied = prev.active_percentage == curr.active_percentage
                && prev.total_active_hours == curr.total_active_hours
                && prev.average_daily_active_hours == curr.average_daily_active_hours
                && prev.total_discrepancies == curr.total_discrepancies
                && prev.critical_discrepancies == curr.critical_discrepancies;
            if !tied {
                current_rank = i + 1;
            }
        }
        rankings[i].rank = current_rank;
    }

    Some(UserRanking {
        rankings,
        summary: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::week::hour_slot_bounds;

    fn hourly_slots() -> Vec<HourlyBreakdown> {
        (0..24)
            .map(|hour| {
                let (start_time, end_time) = hour_slot_bounds(hour);
                HourlyBreakdown {
                    hour,
                    start_time,
                    end_time,
                    active_minutes: 0.0,
                    afk_minutes: 0.0,
                    app_usage: vec![],
                    total_minutes: 60,
                }
            })
            .collect()
    }

    fn user(name: &str, active_hours: f64, afk_hours: f64) -> UserReport {
        UserReport {
            user_name: name.to_string(),
            overall_report: OverallReport {
                period_start: "2025-11-17".to_string(),
                period_end: "2025-11-23".to_string(),
                total_active_hours: active_hours,
                total_active_minutes: active_hours * 60.0,
                total_afk_hours: afk_hours,
                total_afk_minutes: afk_hours * 60.0,
                average_daily_active_hours: active_hours / 7.0,
                average_daily_active_minutes: active_hours * 60.0 / 7.0,
                total_discrepancies: 0,
                critical_discrepancies: 0,
                summary: String::new(),
                conclusion: String::new(),
            },
            daily_reports: vec![DailyReport {
                date: "2025-11-17".to_string(),
                hourly_breakdown: hourly_slots(),
                total_active_minutes: 0.0,
                total_active_hours: 0.0,
                total_afk_minutes: 0.0,
                total_afk_hours: 0.0,
                notable_discrepancies: vec![],
                summary: String::new(),
            }],
        }
    }

    fn report_with(users: Vec<UserReport>) -> Report {
        Report {
            organizations: vec![Organization {
                organization_name: "Turbo".to_string(),
                users,
                user_ranking: None,
            }],
            generated_at: "2025-11-24T00:00:00Z".to_string(),
            period_analyzed: Period {
                start_date: "2025-11-17".to_string(),
                end_date: "2025-11-23".to_string(),
            },
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_report() {
        let report = report_with(vec![user("ben", 30.0, 10.0)]);
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_report() {
        let report = Report {
            organizations: vec![],
            generated_at: String::new(),
            period_analyzed: Period {
                start_date: String::new(),
                end_date: String::new(),
            },
        };
        assert_eq!(report.validate(), Err(ReportShapeError::NoOrganizations));
    }

    #[test]
    fn test_validate_rejects_short_hourly_breakdown() {
        let mut report = report_with(vec![user("ben", 30.0, 10.0)]);
        report.organizations[0].users[0].daily_reports[0]
            .hourly_breakdown
            .truncate(23);
        assert!(matches!(
            report.validate(),
            Err(ReportShapeError::WrongSlotCount { slots: 23, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_misordered_hours() {
        let mut report = report_with(vec![user("ben", 30.0, 10.0)]);
        report.organizations[0].users[0].daily_reports[0].hourly_breakdown[5].hour = 7;
        assert!(matches!(
            report.validate(),
            Err(ReportShapeError::MisorderedHours { index: 5, hour: 7, .. })
        ));
    }

    #[test]
    fn test_rankings_need_two_users() {
        assert!(compute_user_rankings(&[user("ben", 30.0, 10.0)]).is_none());
    }

    #[test]
    fn test_rankings_order_by_active_percentage() {
        let users = vec![user("ben", 30.0, 10.0), user("ada", 35.0, 5.0)];
        let ranking = compute_user_rankings(&users).unwrap();
        assert_eq!(ranking.rankings[0].user_name, "ada");
        assert_eq!(ranking.rankings[0].rank, 1);
        assert_eq!(ranking.rankings[1].user_name, "ben");
        assert_eq!(ranking.rankings[1].rank, 2);
    }

    #[test]
    fn test_rankings_tie_shares_rank() {
        let users = vec![user("ben", 30.0, 10.0), user("ada", 30.0, 10.0)];
        let ranking = compute_user_rankings(&users).unwrap();
        assert_eq!(ranking.rankings[0].rank, 1);
        assert_eq!(ranking.rankings[1].rank, 1);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_report_round_trips_camel_case() {
        let report = report_with(vec![user("ben", 30.0, 10.0)]);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"organizationName\""));
        assert!(json.contains("\"periodAnalyzed\""));
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
