// libs/branch-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BranchError, CreateBranchRequest, CreateHolidayRequest, SetBusinessHoursRequest,
    UpdateBranchRequest,
};
use crate::services::{BranchService, CalendarService};

#[derive(Debug, Deserialize)]
pub struct HolidayQueryParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn map_branch_error(e: BranchError) -> AppError {
    match e {
        BranchError::NotFound => AppError::NotFound("Branch not found".to_string()),
        BranchError::ValidationError(msg) => AppError::ValidationError(msg),
        BranchError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

fn require_admin(user: &User) -> Result<(), AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can manage branches".to_string(),
        ));
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn create_branch(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateBranchRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = BranchService::new(&state);
    let branch = service
        .create_branch(request, auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!({
        "success": true,
        "branch": branch
    })))
}

#[axum::debug_handler]
pub async fn update_branch(
    State(state): State<Arc<AppConfig>>,
    Path(branch_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateBranchRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = BranchService::new(&state);
    let branch = service
        .update_branch(branch_id, request, auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!({
        "success": true,
        "branch": branch
    })))
}

#[axum::debug_handler]
pub async fn get_branch(
    State(state): State<Arc<AppConfig>>,
    Path(branch_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = BranchService::new(&state);
    let branch = service
        .get_branch(branch_id, auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!(branch)))
}

#[axum::debug_handler]
pub async fn list_branches(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = BranchService::new(&state);
    let branches = service
        .list_branches(auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!({ "branches": branches })))
}

#[axum::debug_handler]
pub async fn set_business_hours(
    State(state): State<Arc<AppConfig>>,
    Path(branch_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SetBusinessHoursRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = CalendarService::new(&state);
    let hours = service
        .set_business_hours(branch_id, request, auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!({
        "success": true,
        "business_hours": hours
    })))
}

#[axum::debug_handler]
pub async fn get_business_hours(
    State(state): State<Arc<AppConfig>>,
    Path(branch_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = CalendarService::new(&state);
    let hours = service
        .get_business_hours(branch_id, auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!({ "business_hours": hours })))
}

#[axum::debug_handler]
pub async fn create_holiday(
    State(state): State<Arc<AppConfig>>,
    Path(branch_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateHolidayRequest>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = CalendarService::new(&state);
    let holiday = service
        .create_holiday(branch_id, request, auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!({
        "success": true,
        "holiday": holiday
    })))
}

#[axum::debug_handler]
pub async fn list_holidays(
    State(state): State<Arc<AppConfig>>,
    Path(branch_id): Path<Uuid>,
    Query(params): Query<HolidayQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = CalendarService::new(&state);
    let holidays = service
        .list_holidays(branch_id, params.from, params.to, auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!({ "holidays": holidays })))
}

#[axum::debug_handler]
pub async fn delete_holiday(
    State(state): State<Arc<AppConfig>>,
    Path((branch_id, holiday_id)): Path<(Uuid, Uuid)>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_admin(&user)?;

    let service = CalendarService::new(&state);
    service
        .delete_holiday(branch_id, holiday_id, auth.token())
        .await
        .map_err(map_branch_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Holiday deleted"
    })))
}
