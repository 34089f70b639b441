// libs/appointment-cell/src/services/booking.rs
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use branch_cell::services::BranchService;
use shared_config::AppConfig;
use shared_database::supabase::{DatabaseError, SupabaseClient};
use shared_utils::{Clock, SystemClock};
use staff_cell::services::StaffService;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, AppointmentWithServices,
    BookAppointmentRequest, BookingError, PaymentStatus, UpdateAppointmentRequest,
};
use crate::services::availability::AvailabilityService;
use crate::services::catalog::ServiceCatalog;
use crate::services::ledger::BookingLedger;
use crate::services::lifecycle::AppointmentLifecycle;

/// Owns every appointment mutation. Each booking-affecting write re-validates
/// through the availability resolver, and the write itself is guarded by the
/// partial unique index on (staff_id, appointment_date, appointment_time)
/// over non-cancelled rows — a lost race surfaces as the same
/// `SlotUnavailable` error the pre-check would have produced.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    availability: AvailabilityService,
    ledger: BookingLedger,
    catalog: ServiceCatalog,
    lifecycle: AppointmentLifecycle,
    branch_service: BranchService,
    staff_service: StaffService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            availability: AvailabilityService::with_clock(config, clock),
            ledger: BookingLedger::new(Arc::clone(&supabase)),
            catalog: ServiceCatalog::new(Arc::clone(&supabase)),
            lifecycle: AppointmentLifecycle::new(),
            branch_service: BranchService::new(config),
            staff_service: StaffService::new(config),
            supabase,
        }
    }

    pub fn availability(&self) -> &AvailabilityService {
        &self.availability
    }

    pub fn ledger(&self) -> &BookingLedger {
        &self.ledger
    }

    /// Book a new appointment.
    ///
    /// Validates the branch, the staff member and the requested services,
    /// runs the availability resolver, then inserts the appointment as
    /// `scheduled` together with the per-service price snapshot.
    pub async fn create(
        &self,
        customer_id: Uuid,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<AppointmentWithServices, BookingError> {
        info!(
            "Booking appointment for customer {} with staff {} at branch {} on {} {}",
            customer_id, request.staff_id, request.branch_id, request.date, request.time
        );

        self.branch_service
            .get_branch(request.branch_id, auth_token)
            .await
            .map_err(|e| match e {
                branch_cell::models::BranchError::NotFound => BookingError::BranchNotFound,
                other => BookingError::DatabaseError(other.to_string()),
            })?;

        let staff = self
            .staff_service
            .get_staff(request.staff_id, auth_token)
            .await
            .map_err(|e| match e {
                staff_cell::models::StaffError::NotFound => BookingError::StaffNotFound,
                other => BookingError::DatabaseError(other.to_string()),
            })?;

        if !staff.is_available {
            return Err(BookingError::SlotUnavailable(
                "Staff member is not accepting bookings".to_string(),
            ));
        }

        let affiliated = self
            .staff_service
            .is_affiliated_with_branch(request.staff_id, request.branch_id, auth_token)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if !affiliated {
            return Err(BookingError::ValidationError(
                "Staff member does not work at this branch".to_string(),
            ));
        }

        // Snapshot catalog prices before touching the slot; a bad service
        // list must not leave a half-created booking behind.
        let services = self
            .catalog
            .get_bookable_services(&request.service_ids, auth_token)
            .await?;

        let verdict = self
            .availability
            .check_availability(
                request.branch_id,
                request.staff_id,
                request.date,
                request.time,
                None,
                auth_token,
            )
            .await?;

        if !verdict.available {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "Slot unavailable".to_string());
            warn!(
                "Slot rejected for staff {} on {} {}: {}",
                request.staff_id, request.date, request.time, reason
            );
            return Err(BookingError::SlotUnavailable(reason));
        }

        let appointment = self
            .insert_appointment(customer_id, &request, auth_token)
            .await?;

        let booked_services = self
            .insert_service_snapshot(appointment.id, &services, auth_token)
            .await?;

        info!("Appointment {} booked successfully", appointment.id);
        Ok(AppointmentWithServices {
            appointment,
            services: booked_services,
        })
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        self.ledger.get_appointment(appointment_id, auth_token).await
    }

    pub async fn get_appointment_with_services(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<AppointmentWithServices, BookingError> {
        let appointment = self.ledger.get_appointment(appointment_id, auth_token).await?;
        let services = self
            .ledger
            .get_booked_services(appointment_id, auth_token)
            .await?;

        Ok(AppointmentWithServices {
            appointment,
            services,
        })
    }

    /// Reassign the appointment to different staff at the same slot.
    pub async fn reassign_staff(
        &self,
        appointment_id: Uuid,
        new_staff_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        self.update_schedule(
            appointment_id,
            UpdateAppointmentRequest {
                staff_id: Some(new_staff_id),
                date: None,
                time: None,
            },
            auth_token,
        )
        .await
    }

    /// Move the appointment to a new date/time for the same staff member.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        new_date: NaiveDate,
        new_time: NaiveTime,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        self.update_schedule(
            appointment_id,
            UpdateAppointmentRequest {
                staff_id: None,
                date: Some(new_date),
                time: Some(new_time),
            },
            auth_token,
        )
        .await
    }

    /// Apply a combined reassign/reschedule. The resulting slot is
    /// re-validated as a whole; the appointment's own row is excluded from
    /// the conflict check so an unchanged slot never conflicts with itself.
    pub async fn update_schedule(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        debug!("Updating schedule for appointment {}", appointment_id);

        if request.staff_id.is_none() && request.date.is_none() && request.time.is_none() {
            return Err(BookingError::ValidationError(
                "Nothing to update: provide staff_id, date or time".to_string(),
            ));
        }

        let current = self.ledger.get_appointment(appointment_id, auth_token).await?;

        if current.is_terminal() {
            return Err(BookingError::InvalidStatusTransition(current.status));
        }

        let new_staff_id = request.staff_id.unwrap_or(current.staff_id);
        let new_date = request.date.unwrap_or(current.appointment_date);
        let new_time = request.time.unwrap_or(current.appointment_time);
        let slot_moved =
            new_date != current.appointment_date || new_time != current.appointment_time;

        let verdict = self
            .availability
            .check_availability(
                current.branch_id,
                new_staff_id,
                new_date,
                new_time,
                Some(appointment_id),
                auth_token,
            )
            .await?;

        if !verdict.available {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "Slot unavailable".to_string());
            return Err(BookingError::SlotUnavailable(reason));
        }

        let mut update_data = serde_json::Map::new();
        update_data.insert("staff_id".to_string(), json!(new_staff_id));
        update_data.insert("appointment_date".to_string(), json!(new_date));
        update_data.insert(
            "appointment_time".to_string(),
            json!(new_time.format("%H:%M:%S").to_string()),
        );
        if slot_moved {
            // A moved appointment returns to the scheduled state.
            update_data.insert(
                "status".to_string(),
                json!(AppointmentStatus::Scheduled.to_string()),
            );
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .patch_appointment(appointment_id, Value::Object(update_data), auth_token)
            .await?;

        info!(
            "Appointment {} moved to staff {} on {} {}",
            appointment_id, new_staff_id, new_date, new_time
        );
        Ok(updated)
    }

    /// Apply an explicit status transition, validated against the state
    /// machine.
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        debug!(
            "Updating status of appointment {} to {}",
            appointment_id, new_status
        );

        let current = self.ledger.get_appointment(appointment_id, auth_token).await?;

        self.lifecycle
            .validate_status_transition(&current.status, &new_status)?;

        let update_data = json!({
            "status": new_status.to_string(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let updated = self
            .patch_appointment(appointment_id, update_data, auth_token)
            .await?;

        info!(
            "Appointment {} transitioned {} -> {}",
            appointment_id, current.status, new_status
        );
        Ok(updated)
    }

    /// Cancel the appointment, freeing its slot for subsequent bookings.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        debug!("Cancelling appointment {}", appointment_id);

        let current = self.ledger.get_appointment(appointment_id, auth_token).await?;

        if !self.lifecycle.can_cancel(&current.status) {
            return Err(BookingError::InvalidStatusTransition(current.status));
        }

        let mut update_data = serde_json::Map::new();
        update_data.insert(
            "status".to_string(),
            json!(AppointmentStatus::Cancelled.to_string()),
        );
        if let Some(reason) = reason {
            update_data.insert("notes".to_string(), json!(format!("Cancelled: {}", reason)));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let cancelled = self
            .patch_appointment(appointment_id, Value::Object(update_data), auth_token)
            .await?;

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Rate a completed appointment. Ratings are only accepted
    /// post-completion.
    pub async fn rate(
        &self,
        appointment_id: Uuid,
        rating: i32,
        review: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        if !(1..=5).contains(&rating) {
            return Err(BookingError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let current = self.ledger.get_appointment(appointment_id, auth_token).await?;

        if current.status != AppointmentStatus::Completed {
            return Err(BookingError::ValidationError(
                "Only completed appointments can be rated".to_string(),
            ));
        }

        let update_data = json!({
            "rating": rating,
            "review": review,
            "updated_at": Utc::now().to_rfc3339()
        });

        self.patch_appointment(appointment_id, update_data, auth_token)
            .await
    }

    pub async fn search(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        self.ledger.search(query, auth_token).await
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn insert_appointment(
        &self,
        customer_id: Uuid,
        request: &BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let now = Utc::now();
        let appointment_data = json!({
            "customer_id": customer_id,
            "staff_id": request.staff_id,
            "branch_id": request.branch_id,
            "appointment_date": request.date,
            "appointment_time": request.time.format("%H:%M:%S").to_string(),
            "status": AppointmentStatus::Scheduled.to_string(),
            "payment_status": PaymentStatus::Unpaid.to_string(),
            "notes": request.notes,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(appointment_data),
                Some(headers),
            )
            .await
            .map_err(|e| match e {
                // Unique-violation on the slot index: another booking won the
                // race between our pre-check and this insert.
                DatabaseError::Conflict(_) => {
                    BookingError::SlotUnavailable("Slot already booked".to_string())
                }
                other => BookingError::DatabaseError(other.to_string()),
            })?;

        if result.is_empty() {
            return Err(BookingError::DatabaseError(
                "Failed to create appointment".to_string(),
            ));
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        Ok(appointment)
    }

    async fn insert_service_snapshot(
        &self,
        appointment_id: Uuid,
        services: &[crate::models::SalonService],
        auth_token: &str,
    ) -> Result<Vec<crate::models::BookedService>, BookingError> {
        let rows: Vec<Value> = services
            .iter()
            .map(|service| {
                json!({
                    "appointment_id": appointment_id,
                    "service_id": service.id,
                    "service_name": service.name,
                    "price": service.price
                })
            })
            .collect();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointment_services",
                Some(auth_token),
                Some(Value::Array(rows)),
                Some(headers),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let booked: Vec<crate::models::BookedService> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<crate::models::BookedService>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse booked services: {}", e)))?;

        Ok(booked)
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        update_data: Value,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict(_) => {
                    BookingError::SlotUnavailable("Slot already booked".to_string())
                }
                other => BookingError::DatabaseError(other.to_string()),
            })?;

        if result.is_empty() {
            return Err(BookingError::DatabaseError(
                "Failed to update appointment".to_string(),
            ));
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        Ok(appointment)
    }
}
