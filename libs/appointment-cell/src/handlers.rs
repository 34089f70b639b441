// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use staff_cell::services::StaffService;

use crate::models::{
    Appointment, AppointmentSearchQuery, AppointmentStatus, BookAppointmentRequest,
    BookingError, CancelAppointmentRequest, DecideRescheduleRequest, ProposeRescheduleRequest,
    RateAppointmentRequest, RescheduleStatus, UpdateAppointmentRequest, UpdateStatusRequest,
};
use crate::services::booking::BookingService;
use crate::services::reschedule::RescheduleService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub branch_id: Uuid,
    pub staff_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub branch_id: Option<Uuid>,
    pub staff_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    pub staff_id: Option<Uuid>,
    pub days_ahead: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleListQuery {
    pub status: Option<RescheduleStatus>,
}

fn map_booking_error(e: BookingError) -> AppError {
    match e {
        BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        BookingError::RescheduleRequestNotFound => {
            AppError::NotFound("Reschedule request not found or already decided".to_string())
        }
        BookingError::BranchNotFound => AppError::NotFound("Branch not found".to_string()),
        BookingError::StaffNotFound => AppError::NotFound("Staff member not found".to_string()),
        BookingError::SlotUnavailable(reason) => AppError::Conflict(reason),
        BookingError::InvalidStatusTransition(status) => AppError::UnprocessableEntity(format!(
            "Illegal status transition from {}",
            status
        )),
        BookingError::Conflict(msg) => AppError::Conflict(msg),
        BookingError::ValidationError(msg) => AppError::ValidationError(msg),
        BookingError::Unauthorized => {
            AppError::Auth("Not authorized to access this appointment".to_string())
        }
        BookingError::DatabaseError(msg) => AppError::Internal(msg),
    }
}

fn parse_user_id(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

/// Customer owns the appointment, or the caller manages bookings, or the
/// caller is the assigned staff member.
async fn authorize_appointment_access(
    state: &Arc<AppConfig>,
    appointment: &Appointment,
    user: &User,
    token: &str,
) -> Result<(), AppError> {
    if user.can_manage_bookings() {
        return Ok(());
    }

    if appointment.customer_id.to_string() == user.id {
        return Ok(());
    }

    if user.is_staff() {
        let staff_service = StaffService::new(state);
        if let Ok(staff) = staff_service.get_staff_by_user(&user.id, token).await {
            if staff.id == appointment.staff_id {
                return Ok(());
            }
        }
    }

    Err(AppError::Auth(
        "Not authorized to access this appointment".to_string(),
    ))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Customers book for themselves; reception and admin may book on behalf
    // of any customer.
    let customer_id = match request.customer_id {
        Some(customer_id) => {
            if customer_id.to_string() != user.id && !user.can_manage_bookings() {
                return Err(AppError::Auth(
                    "Not authorized to book for another customer".to_string(),
                ));
            }
            customer_id
        }
        None => parse_user_id(&user)?,
    };

    let service = BookingService::new(&state);
    let booked = service
        .create(customer_id, request, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": booked.appointment,
        "services": booked.services,
        "total_price": booked.total_price(),
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let verdict = service
        .availability()
        .check_availability(
            query.branch_id,
            query.staff_id,
            query.date,
            query.time,
            None,
            auth.token(),
        )
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!(verdict)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(&state);

    let booked = service
        .get_appointment_with_services(appointment_id, token)
        .await
        .map_err(map_booking_error)?;

    authorize_appointment_access(&state, &booked.appointment, &user, token).await?;

    Ok(Json(json!({
        "appointment": booked.appointment,
        "services": booked.services,
        "total_price": booked.total_price()
    })))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.can_manage_bookings() && !user.is_staff() {
        return Err(AppError::Auth(
            "Not authorized to update appointment status".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    if user.is_staff() {
        let appointment = service
            .get_appointment(appointment_id, token)
            .await
            .map_err(map_booking_error)?;
        authorize_appointment_access(&state, &appointment, &user, token).await?;
    }

    let updated = service
        .update_status(appointment_id, request.status, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated
    })))
}

#[axum::debug_handler]
pub async fn update_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.can_manage_bookings() {
        return Err(AppError::Auth(
            "Only reception or admin can reassign or reschedule directly".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let updated = service
        .update_schedule(appointment_id, request, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(&state);

    let appointment = service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_booking_error)?;

    authorize_appointment_access(&state, &appointment, &user, token).await?;

    let cancelled = service
        .cancel(appointment_id, request.reason, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn rate_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<RateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = BookingService::new(&state);

    let appointment = service
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_booking_error)?;

    // Only the customer who attended may rate.
    if appointment.customer_id.to_string() != user.id {
        return Err(AppError::Auth(
            "Only the customer can rate their appointment".to_string(),
        ));
    }

    let rated = service
        .rate(appointment_id, request.rating, request.review, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": rated
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    // Customers only ever see their own appointments.
    let customer_filter = if user.can_manage_bookings() || user.is_staff() {
        params.customer_id
    } else {
        Some(parse_user_id(&user)?)
    };

    let query = AppointmentSearchQuery {
        branch_id: params.branch_id,
        staff_id: params.staff_id,
        customer_id: customer_filter,
        status: params.status,
        from_date: params.from_date,
        to_date: params.to_date,
        limit: params.limit,
        offset: params.offset,
    };

    let service = BookingService::new(&state);
    let appointments = service
        .search(query, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "appointments": appointments })))
}

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<UpcomingQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let today = Utc::now().date_naive();
    let horizon = today + Duration::days(params.days_ahead.unwrap_or(7));

    let customer_filter = if user.can_manage_bookings() || user.is_staff() {
        None
    } else {
        Some(parse_user_id(&user)?)
    };

    let query = AppointmentSearchQuery {
        branch_id: None,
        staff_id: params.staff_id,
        customer_id: customer_filter,
        status: None,
        from_date: Some(today),
        to_date: Some(horizon),
        limit: Some(50),
        offset: None,
    };

    let service = BookingService::new(&state);
    let mut appointments = service
        .search(query, auth.token())
        .await
        .map_err(map_booking_error)?;

    // Only active appointments are "upcoming".
    appointments.retain(|apt| {
        matches!(
            apt.status,
            AppointmentStatus::Pending | AppointmentStatus::Scheduled | AppointmentStatus::InProgress
        )
    });

    Ok(Json(json!({ "appointments": appointments })))
}

// ==============================================================================
// RESCHEDULE REQUEST HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn propose_reschedule(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ProposeRescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = RescheduleService::new(&state);

    // Customers may only move their own appointments.
    if !user.can_manage_bookings() {
        let owner = service
            .get_appointment_owner(request.appointment_id, token)
            .await
            .map_err(map_booking_error)?;
        if owner.to_string() != user.id {
            return Err(AppError::Auth(
                "Not authorized to reschedule this appointment".to_string(),
            ));
        }
    }

    let proposal = service
        .propose(request, token)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "reschedule_request": proposal
    })))
}

#[axum::debug_handler]
pub async fn list_reschedule_requests(
    State(state): State<Arc<AppConfig>>,
    Query(params): Query<RescheduleListQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.can_manage_bookings() {
        return Err(AppError::Auth(
            "Only reception or admin can list reschedule requests".to_string(),
        ));
    }

    let service = RescheduleService::new(&state);
    let requests = service
        .list(params.status, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({ "reschedule_requests": requests })))
}

#[axum::debug_handler]
pub async fn decide_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(request_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<DecideRescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Auth(
            "Only administrators can decide reschedule requests".to_string(),
        ));
    }

    let approve = match request.status {
        RescheduleStatus::Approved => true,
        RescheduleStatus::Rejected => false,
        RescheduleStatus::Pending => {
            return Err(AppError::ValidationError(
                "Decision status must be approved or rejected".to_string(),
            ));
        }
    };

    let service = RescheduleService::new(&state);
    let decided = service
        .decide(request_id, approve, request.admin_notes, auth.token())
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "reschedule_request": decided
    })))
}
