// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// One bookable unit of staff time is the (staff_id, appointment_date,
/// appointment_time) slot. At most one non-cancelled appointment may occupy
/// a slot; cancelling frees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub staff_id: Uuid,
    pub branch_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Terminal appointments no longer hold or release the slot.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }

    /// Non-cancelled appointments reserve their slot.
    pub fn reserves_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Unpaid => write!(f, "unpaid"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

/// Catalog entry consumed at booking time. Read-only here; the catalog is
/// managed elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalonService {
    pub id: Uuid,
    pub name: String,
    pub price: f64,
    pub duration_minutes: i32,
    pub is_active: bool,
}

/// Price snapshot taken when the appointment was booked. Later catalog price
/// changes never alter historical appointment totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedService {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentWithServices {
    pub appointment: Appointment,
    pub services: Vec<BookedService>,
}

impl AppointmentWithServices {
    pub fn total_price(&self) -> f64 {
        self.services.iter().map(|s| s.price).sum()
    }
}

// ==============================================================================
// RESCHEDULE REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RescheduleStatus {
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for RescheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RescheduleStatus::Pending => write!(f, "pending"),
            RescheduleStatus::Approved => write!(f, "approved"),
            RescheduleStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Customer-proposed move of an existing appointment. The original date and
/// time are snapshotted at proposal time; the appointment itself is only
/// mutated when an admin approves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleRequest {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub original_date: NaiveDate,
    pub original_time: NaiveTime,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub reason: Option<String>,
    pub status: RescheduleStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub customer_id: Option<Uuid>, // Defaults to the authenticated customer
    pub branch_id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub service_ids: Vec<Uuid>,
    pub notes: Option<String>,
}

/// Direct reassign/reschedule by reception or admin. Each field present is
/// applied; the slot is re-validated as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub staff_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateAppointmentRequest {
    pub rating: i32,
    pub review: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeRescheduleRequest {
    pub appointment_id: Uuid,
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecideRescheduleRequest {
    pub status: RescheduleStatus,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub branch_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

/// Verdict of the availability resolver. `reason` carries the first failed
/// check so the caller can render an actionable message; opening and closing
/// times are included for the day when known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityVerdict {
    pub available: bool,
    pub reason: Option<String>,
    pub opening_time: Option<NaiveTime>,
    pub closing_time: Option<NaiveTime>,
}

impl AvailabilityVerdict {
    pub fn available(opening_time: Option<NaiveTime>, closing_time: Option<NaiveTime>) -> Self {
        Self {
            available: true,
            reason: None,
            opening_time,
            closing_time,
        }
    }

    pub fn unavailable(
        reason: impl Into<String>,
        opening_time: Option<NaiveTime>,
        closing_time: Option<NaiveTime>,
    ) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
            opening_time,
            closing_time,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum BookingError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Reschedule request not found or already decided")]
    RescheduleRequestNotFound,

    #[error("Branch not found")]
    BranchNotFound,

    #[error("Staff member not found")]
    StaffNotFound,

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("Invalid status transition from {0}")]
    InvalidStatusTransition(AppointmentStatus),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
