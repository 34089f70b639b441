// libs/staff-cell/src/services/leave.rs
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::intervals_overlap;

use crate::models::{LeaveRequest, LeaveStatus, StaffError, SubmitLeaveRequest};

pub struct LeaveService {
    supabase: SupabaseClient,
}

impl LeaveService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Submit a new leave request for a staff member.
    ///
    /// Rejected when any *non-rejected* request for the same staff overlaps
    /// the proposed inclusive date range; a rejected request frees its dates
    /// for resubmission.
    pub async fn submit_leave_request(
        &self,
        staff_id: Uuid,
        request: SubmitLeaveRequest,
        auth_token: &str,
    ) -> Result<LeaveRequest, StaffError> {
        debug!(
            "Submitting leave request for staff {} from {} to {}",
            staff_id, request.start_date, request.end_date
        );

        if request.end_date < request.start_date {
            return Err(StaffError::ValidationError(
                "End date must not be before start date".to_string(),
            ));
        }

        let existing = self
            .get_non_rejected_requests(staff_id, auth_token)
            .await?;

        for other in &existing {
            if intervals_overlap(
                request.start_date,
                request.end_date,
                other.start_date,
                other.end_date,
            ) {
                warn!(
                    "Overlapping leave request for staff {}: {}..{} vs existing {}..{}",
                    staff_id, request.start_date, request.end_date, other.start_date, other.end_date
                );
                return Err(StaffError::Conflict(format!(
                    "An existing leave request already covers {} to {}",
                    other.start_date, other.end_date
                )));
            }
        }

        let now = Utc::now();
        let leave_data = json!({
            "staff_id": staff_id,
            "start_date": request.start_date,
            "end_date": request.end_date,
            "reason": request.reason,
            "status": LeaveStatus::Pending.to_string(),
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
                "/rest/v1/leave_requests",
                Some(auth_token),
                Some(leave_data),
                Some(headers),
            )
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::DatabaseError(
                "Failed to create leave request".to_string(),
            ));
        }

        let leave_request: LeaveRequest = serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse leave request: {}", e)))?;

        info!(
            "Leave request {} submitted for staff {}",
            leave_request.id, staff_id
        );
        Ok(leave_request)
    }

    /// Decide a pending request. Approving or rejecting is terminal for the
    /// request; a request that is no longer pending cannot be decided again.
    pub async fn decide(
        &self,
        request_id: Uuid,
        approver_id: Uuid,
        approve: bool,
        rejection_reason: Option<String>,
        auth_token: &str,
    ) -> Result<LeaveRequest, StaffError> {
        debug!("Deciding leave request {} (approve: {})", request_id, approve);

        let current = self.get_leave_request(request_id, auth_token).await?;

        if current.status != LeaveStatus::Pending {
            return Err(StaffError::LeaveRequestNotFound);
        }

        let new_status = if approve {
            LeaveStatus::Approved
        } else {
            LeaveStatus::Rejected
        };

        let update_data = json!({
            "status": new_status.to_string(),
            "decided_by": approver_id,
            "rejection_reason": if approve { None } else { rejection_reason },
            "updated_at": Utc::now().to_rfc3339()
        });

        let path = format!("/rest/v1/leave_requests?id=eq.{}", request_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::DatabaseError(
                "Failed to update leave request".to_string(),
            ));
        }

        let decided: LeaveRequest = serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse leave request: {}", e)))?;

        info!(
            "Leave request {} {} by {}",
            request_id, decided.status, approver_id
        );
        Ok(decided)
    }

    /// True iff an approved leave interval contains `date`.
    pub async fn is_staff_on_leave(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<bool, StaffError> {
        let path = format!(
            "/rest/v1/leave_requests?staff_id=eq.{}&status=eq.approved&start_date=lte.{}&end_date=gte.{}",
            staff_id, date, date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    pub async fn get_leave_request(
        &self,
        request_id: Uuid,
        auth_token: &str,
    ) -> Result<LeaveRequest, StaffError> {
        let path = format!("/rest/v1/leave_requests?id=eq.{}", request_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::LeaveRequestNotFound);
        }

        let leave_request: LeaveRequest = serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse leave request: {}", e)))?;

        Ok(leave_request)
    }

    pub async fn list_leave_requests(
        &self,
        staff_id: Option<Uuid>,
        status: Option<LeaveStatus>,
        auth_token: &str,
    ) -> Result<Vec<LeaveRequest>, StaffError> {
        let mut path = "/rest/v1/leave_requests?order=start_date.desc".to_string();
        if let Some(staff_id) = staff_id {
            path.push_str(&format!("&staff_id=eq.{}", staff_id));
        }
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let requests: Vec<LeaveRequest> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<LeaveRequest>, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse leave requests: {}", e)))?;

        Ok(requests)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn get_non_rejected_requests(
        &self,
        staff_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<LeaveRequest>, StaffError> {
        let path = format!(
            "/rest/v1/leave_requests?staff_id=eq.{}&status=neq.rejected",
            staff_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let requests: Vec<LeaveRequest> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<LeaveRequest>, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse leave requests: {}", e)))?;

        Ok(requests)
    }
}
