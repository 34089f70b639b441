// libs/appointment-cell/src/services/reschedule.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::{Clock, SystemClock};

use crate::models::{
    AppointmentStatus, BookingError, ProposeRescheduleRequest, RescheduleRequest,
    RescheduleStatus,
};
use crate::services::booking::BookingService;

/// Customer-facing approval workflow layered on top of the booking
/// lifecycle. A proposal snapshots the original slot and leaves the
/// appointment untouched until an admin approves; approval goes through the
/// regular reschedule path, so a slot lost between proposal and decision
/// surfaces as `SlotUnavailable` and the request stays pending for the admin
/// to retry or reject.
pub struct RescheduleService {
    supabase: Arc<SupabaseClient>,
    booking: BookingService,
}

impl RescheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            booking: BookingService::with_clock(config, clock),
        }
    }

    /// Propose moving an existing scheduled appointment to a new slot.
    ///
    /// Only one proposal may be pending per appointment at a time; a second
    /// one is rejected until the first is decided.
    pub async fn propose(
        &self,
        request: ProposeRescheduleRequest,
        auth_token: &str,
    ) -> Result<RescheduleRequest, BookingError> {
        debug!(
            "Reschedule proposal for appointment {} to {} {}",
            request.appointment_id, request.new_date, request.new_time
        );

        let appointment = self
            .booking
            .get_appointment(request.appointment_id, auth_token)
            .await?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(BookingError::ValidationError(
                "Only scheduled appointments can be rescheduled".to_string(),
            ));
        }

        if self
            .pending_request_for(request.appointment_id, auth_token)
            .await?
            .is_some()
        {
            warn!(
                "Rejecting second reschedule proposal for appointment {}",
                request.appointment_id
            );
            return Err(BookingError::Conflict(
                "A reschedule request is already pending for this appointment".to_string(),
            ));
        }

        let now = Utc::now();
        let proposal_data = json!({
            "appointment_id": request.appointment_id,
            "original_date": appointment.appointment_date,
            "original_time": appointment.appointment_time.format("%H:%M:%S").to_string(),
            "new_date": request.new_date,
            "new_time": request.new_time.format("%H:%M:%S").to_string(),
            "reason": request.reason,
            "status": RescheduleStatus::Pending.to_string(),
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
                "/rest/v1/reschedule_requests",
                Some(auth_token),
                Some(proposal_data),
                Some(headers),
            )
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::DatabaseError(
                "Failed to create reschedule request".to_string(),
            ));
        }

        let proposal: RescheduleRequest = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse reschedule request: {}", e)))?;

        info!(
            "Reschedule request {} created for appointment {}",
            proposal.id, request.appointment_id
        );
        Ok(proposal)
    }

    /// Decide a pending proposal.
    ///
    /// Approval mutates the underlying appointment through the booking
    /// lifecycle; when that fails the error propagates and the request is
    /// left pending. Rejection marks the request terminal with no
    /// appointment mutation.
    pub async fn decide(
        &self,
        request_id: Uuid,
        approve: bool,
        admin_notes: Option<String>,
        auth_token: &str,
    ) -> Result<RescheduleRequest, BookingError> {
        debug!("Deciding reschedule request {} (approve: {})", request_id, approve);

        let current = self.get_reschedule_request(request_id, auth_token).await?;

        if current.status != RescheduleStatus::Pending {
            return Err(BookingError::RescheduleRequestNotFound);
        }

        if approve {
            // Re-validates availability; a slot taken since the proposal
            // fails here and the request stays pending.
            self.booking
                .reschedule(
                    current.appointment_id,
                    current.new_date,
                    current.new_time,
                    auth_token,
                )
                .await?;
        }

        let new_status = if approve {
            RescheduleStatus::Approved
        } else {
            RescheduleStatus::Rejected
        };

        let update_data = json!({
            "status": new_status.to_string(),
            "admin_notes": admin_notes,
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/reschedule_requests?id=eq.{}", request_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::DatabaseError(
                "Failed to update reschedule request".to_string(),
            ));
        }

        let decided: RescheduleRequest = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse reschedule request: {}", e)))?;

        info!("Reschedule request {} {}", request_id, decided.status);
        Ok(decided)
    }

    pub async fn get_reschedule_request(
        &self,
        request_id: Uuid,
        auth_token: &str,
    ) -> Result<RescheduleRequest, BookingError> {
        let path = format!("/rest/v1/reschedule_requests?id=eq.{}", request_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::RescheduleRequestNotFound);
        }

        let request: RescheduleRequest = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse reschedule request: {}", e)))?;

        Ok(request)
    }

    pub async fn list(
        &self,
        status: Option<RescheduleStatus>,
        auth_token: &str,
    ) -> Result<Vec<RescheduleRequest>, BookingError> {
        let mut path = "/rest/v1/reschedule_requests?order=created_at.desc".to_string();
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let requests: Vec<RescheduleRequest> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<RescheduleRequest>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse reschedule requests: {}", e)))?;

        Ok(requests)
    }

    /// Expose the appointment lookup for handler-side authorization checks.
    pub async fn get_appointment_owner(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Uuid, BookingError> {
        let appointment = self.booking.get_appointment(appointment_id, auth_token).await?;
        Ok(appointment.customer_id)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn pending_request_for(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<RescheduleRequest>, BookingError> {
        let path = format!(
            "/rest/v1/reschedule_requests?appointment_id=eq.{}&status=eq.pending",
            appointment_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        let request: RescheduleRequest = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse reschedule request: {}", e)))?;

        Ok(Some(request))
    }
}
