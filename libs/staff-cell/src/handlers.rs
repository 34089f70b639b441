// libs/staff-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateStaffRequest, DecideLeaveRequest, LeaveStatus, StaffError, SubmitLeaveRequest,
    UpdateStaffRequest,
};
use crate::services::{LeaveService, StaffService};

#[derive(Debug, Deserialize)]
pub struct StaffListQuery {
    pub branch_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct LeaveListQuery {
    pub status: Option<LeaveStatus>,
}

fn map_staff_error(e: StaffError) -> AppError {
    match e {
        StaffError::NotFound => AppError::NotFound("Staff member not found".to_string()),
        StaffError::LeaveRequestNotFound => {
            AppError::NotFound("Leave request not found or already decided".to_string())
        }
        StaffError::Conflict(msg) => AppError::Conflict(msg),
        StaffError::ValidationError(msg) => AppError::ValidationError(msg),
        StaffError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

#[axum::debug_handler]
pub async fn create_staff(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateStaffRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can create staff profiles".to_string(),
        ));
    }

    let service = StaffService::new(&state);
    let staff = service
        .create_staff(request, auth.token())
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({
        "success": true,
        "staff": staff
    })))
}

#[axum::debug_handler]
pub async fn update_staff(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStaffRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can update staff profiles".to_string(),
        ));
    }

    let service = StaffService::new(&state);
    let staff = service
        .update_staff(staff_id, request, auth.token())
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({
        "success": true,
        "staff": staff
    })))
}

#[axum::debug_handler]
pub async fn get_staff(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    let staff = service
        .get_staff(staff_id, auth.token())
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!(staff)))
}

#[axum::debug_handler]
pub async fn list_staff(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<StaffListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = StaffService::new(&state);
    let staff = service
        .list_staff(params.branch_id, auth.token())
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({ "staff": staff })))
}

// ==============================================================================
// LEAVE LEDGER HANDLERS
// ==============================================================================

/// Staff submit leave for themselves; the staff profile is resolved from the
/// authenticated user.
#[axum::debug_handler]
pub async fn submit_leave_request(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SubmitLeaveRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() && !user.is_admin() {
        return Err(AppError::Auth(
            "Only staff members can submit leave requests".to_string(),
        ));
    }

    let token = auth.token();
    let staff_service = StaffService::new(&state);
    let staff = staff_service
        .get_staff_by_user(&user.id, token)
        .await
        .map_err(map_staff_error)?;

    let leave_service = LeaveService::new(&state);
    let leave_request = leave_service
        .submit_leave_request(staff.id, request, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({
        "success": true,
        "leave_request": leave_request
    })))
}

#[axum::debug_handler]
pub async fn get_staff_leave_requests(
    State(state): State<Arc<AppConfig>>,
    Path(staff_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let staff_service = StaffService::new(&state);
    let staff = staff_service
        .get_staff(staff_id, token)
        .await
        .map_err(map_staff_error)?;

    // Staff may only read their own leave history.
    let is_self = staff.user_id.to_string() == user.id;
    if !is_self && !user.is_admin() {
        return Err(AppError::Auth(
            "Not authorized to view leave requests for this staff member".to_string(),
        ));
    }

    let leave_service = LeaveService::new(&state);
    let requests = leave_service
        .list_leave_requests(Some(staff_id), None, token)
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({ "leave_requests": requests })))
}

#[axum::debug_handler]
pub async fn list_leave_requests(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<LeaveListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can list all leave requests".to_string(),
        ));
    }

    let service = LeaveService::new(&state);
    let requests = service
        .list_leave_requests(None, params.status, auth.token())
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({ "leave_requests": requests })))
}

#[axum::debug_handler]
pub async fn decide_leave_request(
    State(state): State<Arc<AppConfig>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DecideLeaveRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can decide leave requests".to_string(),
        ));
    }

    let approve = match request.status {
        LeaveStatus::Approved => true,
        LeaveStatus::Rejected => false,
        LeaveStatus::Pending => {
            return Err(AppError::ValidationError(
                "Decision status must be approved or rejected".to_string(),
            ));
        }
    };

    let approver_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = LeaveService::new(&state);
    let decided = service
        .decide(
            request_id,
            approver_id,
            approve,
            request.rejection_reason,
            auth.token(),
        )
        .await
        .map_err(map_staff_error)?;

    Ok(Json(json!({
        "success": true,
        "leave_request": decided
    })))
}
