use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[serde(rename = "Applied")]
    Applied,
    #[serde(rename = "Interview Scheduled")]
    InterviewScheduled,
    #[serde(rename = "Interviewed")]
    Interviewed,
    #[serde(rename = "Offer")]
    Offer,
    #[serde(rename = "Rejected")]
    Rejected,
    #[serde(rename = "Withdrawn")]
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 6] = [
        ApplicationStatus::Applied,
        ApplicationStatus::InterviewScheduled,
        ApplicationStatus::Interviewed,
        ApplicationStatus::Offer,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    /// Statuses counted as "pending" on the dashboard.
    pub const PENDING: [ApplicationStatus; 2] = [
        ApplicationStatus::Applied,
        ApplicationStatus::InterviewScheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::InterviewScheduled => "Interview Scheduled",
            ApplicationStatus::Interviewed => "Interviewed",
            ApplicationStatus::Offer => "Offer",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Withdrawn => "Withdrawn",
        }
    }

    /// Display color tag for this status.
    pub fn color(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "primary",
            ApplicationStatus::InterviewScheduled => "info",
            ApplicationStatus::Interviewed => "warning",
            ApplicationStatus::Offer => "success",
            ApplicationStatus::Rejected => "danger",
            ApplicationStatus::Withdrawn => "secondary",
        }
    }

    pub fn is_pending(&self) -> bool {
        Self::PENDING.contains(self)
    }
}

/// Color tag for an arbitrary status string; unrecognized values get "secondary".
pub fn status_color(status: &str) -> &'static str {
    status
        .parse::<ApplicationStatus>()
        .map(|s| s.color())
        .unwrap_or("secondary")
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                TrackerError::validation(format!(
                    "unrecognized status '{}' (expected one of: {})",
                    s,
                    ApplicationStatus::ALL.map(|s| s.as_str()).join(", ")
                ))
            })
    }
}

impl ToSql for ApplicationStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ApplicationStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                TrackerError::validation(format!(
                    "unrecognized priority '{}' (expected High, Medium or Low)",
                    s
                ))
            })
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub position: String,
    pub company_id: i64,
    pub company_name: String, // denormalized, not kept in sync on rename
    pub status: ApplicationStatus,
    pub job_link: Option<String>,
    pub salary_range: Option<String>,
    pub date_applied: NaiveDate,
    pub updated_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub priority: Priority,
}

/// Raw field set for adding or editing an application. Required fields are
/// `Option` so a missing value surfaces as a validation error, not a panic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewApplication {
    pub position: Option<String>,
    pub company_name: Option<String>,
    pub status: Option<String>,
    pub job_link: Option<String>,
    pub salary_range: Option<String>,
    pub date_applied: Option<NaiveDate>,
    pub priority: Option<String>,
    pub notes: Option<String>,
}

impl NewApplication {
    /// Full field set of an existing record, for partial edits.
    pub fn from_application(app: &Application) -> Self {
        Self {
            position: Some(app.position.clone()),
            company_name: Some(app.company_name.clone()),
            status: Some(app.status.to_string()),
            job_link: app.job_link.clone(),
            salary_range: app.salary_range.clone(),
            date_applied: Some(app.date_applied),
            priority: Some(app.priority.to_string()),
            notes: app.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

impl NewCompany {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn from_company(company: &Company) -> Self {
        Self {
            name: Some(company.name.clone()),
            industry: company.industry.clone(),
            location: company.location.clone(),
            website: company.website.clone(),
            notes: company.notes.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub company_contains: Option<String>,
    pub company_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyDeletion {
    pub company: Company,
    pub deleted_applications: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: ApplicationStatus,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompanyCount {
    pub company: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub total_apps: i64,
    pub pending_apps: i64,
    pub status_counts: Vec<StatusCount>,
    pub recent_apps: Vec<Application>,
    pub this_week_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analytics {
    pub status_counts: Vec<StatusCount>,
    pub daily_series: Vec<DailyCount>,
    pub top_companies: Vec<CompanyCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        for status in ApplicationStatus::ALL {
            assert_eq!(status.as_str().parse::<ApplicationStatus>().unwrap(), status);
        }
        assert_eq!(
            "Interview Scheduled".parse::<ApplicationStatus>().unwrap(),
            ApplicationStatus::InterviewScheduled
        );
        assert!("applied".parse::<ApplicationStatus>().is_err());
        assert!("Ghosted".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn test_status_colors() {
        assert_eq!(ApplicationStatus::Applied.color(), "primary");
        assert_eq!(ApplicationStatus::InterviewScheduled.color(), "info");
        assert_eq!(ApplicationStatus::Interviewed.color(), "warning");
        assert_eq!(ApplicationStatus::Offer.color(), "success");
        assert_eq!(ApplicationStatus::Rejected.color(), "danger");
        assert_eq!(ApplicationStatus::Withdrawn.color(), "secondary");
        assert_eq!(status_color("Offer"), "success");
        assert_eq!(status_color("Ghosted"), "secondary");
    }

    #[test]
    fn test_pending_statuses() {
        assert!(ApplicationStatus::Applied.is_pending());
        assert!(ApplicationStatus::InterviewScheduled.is_pending());
        assert!(!ApplicationStatus::Interviewed.is_pending());
        assert!(!ApplicationStatus::Offer.is_pending());
    }

    #[test]
    fn test_priority_parse_is_exact() {
        assert_eq!("High".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("Low".parse::<Priority>().unwrap(), Priority::Low);
        assert!("high".parse::<Priority>().is_err());
        assert!(" Low".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Medium);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_status_serializes_as_display_string() {
        let json = serde_json::to_string(&ApplicationStatus::InterviewScheduled).unwrap();
        assert_eq!(json, "\"Interview Scheduled\"");
    }
}
