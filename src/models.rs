use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::GrievanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = GrievanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(GrievanceError::UnknownValue {
                field: "sentiment",
                value: other.to_string(),
            }),
        }
    }
}

/// Triage urgency bucket. Stored and serialized as its integer level (1 = high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "i32")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn level(&self) -> i32 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn from_level(level: i32) -> Result<Self, GrievanceError> {
        match level {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            other => Err(GrievanceError::UnknownValue {
                field: "priority",
                value: other.to_string(),
            }),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }
}

impl From<Priority> for i32 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Pending,
    InProgress,
    Resolved,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pending, Status::InProgress, Status::Resolved];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "Pending",
            Status::InProgress => "In Progress",
            Status::Resolved => "Resolved",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = GrievanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "in progress" | "in-progress" | "in_progress" | "inprogress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            _ => Err(GrievanceError::UnknownValue {
                field: "status",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Staff => "staff",
            Role::Admin => "admin",
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = GrievanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "staff" => Ok(Role::Staff),
            "admin" => Ok(Role::Admin),
            _ => Err(GrievanceError::UnknownValue {
                field: "role",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Academic,
    Hostel,
    Infrastructure,
    Administration,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Academic => "Academic",
            Category::Hostel => "Hostel",
            Category::Infrastructure => "Infrastructure",
            Category::Administration => "Administration",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = GrievanceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "academic" => Ok(Category::Academic),
            "hostel" => Ok(Category::Hostel),
            "infrastructure" => Ok(Category::Infrastructure),
            "administration" => Ok(Category::Administration),
            "other" => Ok(Category::Other),
            _ => Err(GrievanceError::UnknownValue {
                field: "category",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Grievance {
    pub id: Uuid,
    pub submitter_id: Option<Uuid>,
    pub submitter_name: Option<String>,
    pub title: String,
    pub category: Category,
    pub description: String,
    pub sentiment: Sentiment,
    pub priority: Priority,
    pub compound_score: f64,
    pub impact_score: f64,
    pub status: Status,
    pub response: Option<String>,
    pub rating: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A grievance as entered, before scoring.
#[derive(Debug, Clone)]
pub struct NewGrievance {
    pub submitter_id: Option<Uuid>,
    pub title: String,
    pub category: Category,
    pub description: String,
}

impl NewGrievance {
    /// Title and description are required; nothing is scored or stored otherwise.
    pub fn validate(&self) -> Result<(), GrievanceError> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(GrievanceError::MissingFields);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalyticsData {
    pub total_count: i64,
    pub status_counts: BTreeMap<String, i64>,
    pub sentiment_counts: BTreeMap<String, i64>,
    pub avg_rating: Option<f64>,
}

impl AnalyticsData {
    pub fn status_count(&self, status: Status) -> i64 {
        self.status_counts.get(status.as_str()).copied().unwrap_or(0)
    }

    pub fn resolution_rate(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.status_count(Status::Resolved) as f64 / self.total_count as f64 * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_display_and_cli_spellings() {
        assert_eq!("In Progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("in-progress".parse::<Status>().unwrap(), Status::InProgress);
        assert_eq!("resolved".parse::<Status>().unwrap(), Status::Resolved);
        assert!("closed".parse::<Status>().is_err());
    }

    #[test]
    fn priority_levels_map_both_ways() {
        for priority in [Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(Priority::from_level(priority.level()).unwrap(), priority);
        }
        assert!(Priority::from_level(0).is_err());
    }

    #[test]
    fn priority_serializes_as_level() {
        assert_eq!(serde_json::to_value(Priority::High).unwrap(), serde_json::json!(1));
        assert_eq!(serde_json::to_value(Priority::Low).unwrap(), serde_json::json!(3));
    }

    #[test]
    fn blank_title_or_description_is_rejected() {
        let mut grievance = NewGrievance {
            submitter_id: None,
            title: "Broken heater".to_string(),
            category: Category::Hostel,
            description: "   ".to_string(),
        };
        assert!(matches!(grievance.validate(), Err(GrievanceError::MissingFields)));

        grievance.description = "Room 12 has no heat".to_string();
        assert!(grievance.validate().is_ok());
    }

    #[test]
    fn resolution_rate_handles_empty_totals() {
        let mut data = AnalyticsData::default();
        assert_eq!(data.resolution_rate(), 0.0);

        data.total_count = 4;
        data.status_counts.insert("Resolved".to_string(), 1);
        assert!((data.resolution_rate() - 25.0).abs() < 0.001);
    }
}
