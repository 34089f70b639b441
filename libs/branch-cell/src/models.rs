// libs/branch-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE BRANCH MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One weekly schedule row per (branch, weekday). Day-of-week follows the
/// 0 = Sunday .. 6 = Saturday convention used across the REST layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub day_of_week: i32,
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
    pub lunch_start: Option<NaiveTime>,
    pub lunch_end: Option<NaiveTime>,
    pub is_closed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mandatory holidays (is_optional = false) close the branch for the whole
/// date. Optional holidays are advisory and never block booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holiday {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub holiday_date: NaiveDate,
    pub name: String,
    pub is_optional: bool,
    pub created_at: DateTime<Utc>,
}

/// The calendar facts for one branch-date, resolved in a single pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub hours: Option<BusinessHours>,
    pub holiday: Option<Holiday>,
}

impl DaySchedule {
    /// Open iff the weekday row exists, is not flagged closed, and no
    /// mandatory holiday falls on the date.
    pub fn is_open(&self) -> bool {
        let hours_open = match &self.hours {
            Some(hours) => !hours.is_closed,
            None => false,
        };
        let mandatory_holiday = self
            .holiday
            .as_ref()
            .map(|h| !h.is_optional)
            .unwrap_or(false);

        hours_open && !mandatory_holiday
    }

    pub fn opening_time(&self) -> Option<NaiveTime> {
        if !self.is_open() {
            return None;
        }
        self.hours.as_ref().and_then(|h| h.opening_time)
    }

    pub fn closing_time(&self) -> Option<NaiveTime> {
        if !self.is_open() {
            return None;
        }
        self.hours.as_ref().and_then(|h| h.closing_time)
    }

    pub fn lunch_window(&self) -> Option<(NaiveTime, NaiveTime)> {
        let hours = self.hours.as_ref()?;
        match (hours.lunch_start, hours.lunch_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBranchRequest {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBranchRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetBusinessHoursRequest {
    pub day_of_week: i32,
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
    pub lunch_start: Option<NaiveTime>,
    pub lunch_end: Option<NaiveTime>,
    pub is_closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHolidayRequest {
    pub holiday_date: NaiveDate,
    pub name: String,
    pub is_optional: bool,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum BranchError {
    #[error("Branch not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}
