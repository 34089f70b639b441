use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{
    AppointmentStatus, BookAppointmentRequest, BookingError,
};
use appointment_cell::services::BookingService;
use shared_utils::test_utils::{MockPostgrestResponses, TestConfig};
use shared_utils::FixedClock;

const TOKEN: &str = "test-token";

// Clock pinned to Sunday 2025-06-01; bookings target Monday 2025-06-02.
fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

fn booking_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

fn booking_service(mock_server: &MockServer) -> BookingService {
    let config = TestConfig::with_base_url(&mock_server.uri()).to_app_config();
    BookingService::with_clock(&config, Arc::new(FixedClock::at_date(today())))
}

struct Fixture {
    branch_id: Uuid,
    staff_id: Uuid,
    customer_id: Uuid,
    service_id: Uuid,
}

impl Fixture {
    fn new() -> Self {
        Self {
            branch_id: Uuid::new_v4(),
            staff_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
        }
    }

    fn book_request(&self) -> BookAppointmentRequest {
        BookAppointmentRequest {
            customer_id: None,
            branch_id: self.branch_id,
            staff_id: self.staff_id,
            date: booking_day(),
            time: "10:00:00".parse().unwrap(),
            service_ids: vec![self.service_id],
            notes: None,
        }
    }

    /// Mount everything a clean booking needs except the appointments table
    /// itself: branch, staff, affiliation, catalog, open Monday, no
    /// holidays, no leave.
    async fn mount_booking_preconditions(&self, mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/branches"))
            .and(query_param("id", format!("eq.{}", self.branch_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockPostgrestResponses::branch_response(&self.branch_id.to_string(), "Downtown")
            ])))
            .mount(mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/staff"))
            .and(query_param("id", format!("eq.{}", self.staff_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockPostgrestResponses::staff_response(&self.staff_id.to_string(), "Mia", "Laine")
            ])))
            .mount(mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/staff_branches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": Uuid::new_v4(),
                    "staff_id": self.staff_id,
                    "branch_id": self.branch_id,
                    "is_primary": true
                }
            ])))
            .mount(mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockPostgrestResponses::service_response(&self.service_id.to_string(), "Haircut", 42.5)
            ])))
            .mount(mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/business_hours"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                MockPostgrestResponses::business_hours_response(
                    &self.branch_id.to_string(),
                    1,
                    "09:00:00",
                    "20:00:00"
                )
            ])))
            .mount(mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/holidays"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/leave_requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(mock_server)
            .await;
    }

    async fn mount_free_slot(&self, mock_server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(mock_server)
            .await;
    }

    async fn mount_successful_insert(&self, mock_server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                MockPostgrestResponses::appointment_response(
                    &self.customer_id.to_string(),
                    &self.staff_id.to_string(),
                    &self.branch_id.to_string(),
                    "2025-06-02",
                    "10:00:00",
                    "scheduled"
                )
            ])))
            .mount(mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/appointment_services"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([
                {
                    "id": Uuid::new_v4(),
                    "appointment_id": Uuid::new_v4(),
                    "service_id": self.service_id,
                    "service_name": "Haircut",
                    "price": 42.5
                }
            ])))
            .mount(mock_server)
            .await;
    }
}

#[tokio::test]
async fn book_appointment_success_snapshots_prices() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();

    fixture.mount_booking_preconditions(&mock_server).await;
    fixture.mount_free_slot(&mock_server).await;
    fixture.mount_successful_insert(&mock_server).await;

    let service = booking_service(&mock_server);
    let booked = service
        .create(fixture.customer_id, fixture.book_request(), TOKEN)
        .await
        .unwrap();

    assert_eq!(booked.appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(booked.services.len(), 1);
    assert_eq!(booked.services[0].price, 42.5);
    assert_eq!(booked.total_price(), 42.5);
}

#[tokio::test]
async fn booking_a_taken_slot_fails_with_already_booked() {
    // Scenario: staff S is booked at 2025-06-02 10:00; a second customer
    // attempting the same slot must be turned away.
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();

    fixture.mount_booking_preconditions(&mock_server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &fixture.staff_id.to_string(),
                &fixture.branch_id.to_string(),
                "2025-06-02",
                "10:00:00",
                "scheduled"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = booking_service(&mock_server);
    let err = service
        .create(fixture.customer_id, fixture.book_request(), TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::SlotUnavailable(reason) if reason == "Slot already booked");
}

#[tokio::test]
async fn cancelled_occupant_no_longer_blocks_the_slot() {
    // After the first booking is cancelled the conflict query (which filters
    // on status=neq.cancelled) comes back empty, so the retry succeeds.
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();

    fixture.mount_booking_preconditions(&mock_server).await;
    fixture.mount_free_slot(&mock_server).await;
    fixture.mount_successful_insert(&mock_server).await;

    let service = booking_service(&mock_server);
    let rebooked = service
        .create(fixture.customer_id, fixture.book_request(), TOKEN)
        .await
        .unwrap();

    assert_eq!(rebooked.appointment.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn lost_insert_race_maps_unique_violation_to_slot_unavailable() {
    // Both writers passed the pre-check; the partial unique index rejects
    // the second insert with 409 and the caller sees the same business
    // error the pre-check produces, not a raw storage failure.
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();

    fixture.mount_booking_preconditions(&mock_server).await;
    fixture.mount_free_slot(&mock_server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_slot_key\""
        })))
        .mount(&mock_server)
        .await;

    let service = booking_service(&mock_server);
    let err = service
        .create(fixture.customer_id, fixture.book_request(), TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::SlotUnavailable(reason) if reason == "Slot already booked");
}

#[tokio::test]
async fn unknown_service_is_rejected_before_any_write() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();

    fixture.mount_booking_preconditions(&mock_server).await;

    let mut request = fixture.book_request();
    request.service_ids.push(Uuid::new_v4()); // catalog only knows one id

    let service = booking_service(&mock_server);
    let err = service
        .create(fixture.customer_id, request, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::ValidationError(_));

    let posts: Vec<_> = mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.to_string().eq_ignore_ascii_case("post"))
        .collect();
    assert!(posts.is_empty(), "no write may happen for an invalid catalog selection");
}

#[tokio::test]
async fn status_update_follows_the_state_machine() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();
    let appointment_id = Uuid::new_v4();

    let mut row = MockPostgrestResponses::appointment_response(
        &fixture.customer_id.to_string(),
        &fixture.staff_id.to_string(),
        &fixture.branch_id.to_string(),
        "2025-06-02",
        "10:00:00",
        "scheduled",
    );
    row["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&mock_server)
        .await;

    let mut updated = row.clone();
    updated["status"] = json!("in_progress");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .mount(&mock_server)
        .await;

    let service = booking_service(&mock_server);
    let appointment = service
        .update_status(appointment_id, AppointmentStatus::InProgress, TOKEN)
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::InProgress);
}

#[tokio::test]
async fn completed_appointment_rejects_reopening() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();
    let appointment_id = Uuid::new_v4();

    let mut row = MockPostgrestResponses::appointment_response(
        &fixture.customer_id.to_string(),
        &fixture.staff_id.to_string(),
        &fixture.branch_id.to_string(),
        "2025-06-02",
        "10:00:00",
        "completed",
    );
    row["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let service = booking_service(&mock_server);
    let err = service
        .update_status(appointment_id, AppointmentStatus::Scheduled, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(
        err,
        BookingError::InvalidStatusTransition(AppointmentStatus::Completed)
    );
}

#[tokio::test]
async fn cancel_is_legal_from_in_progress() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();
    let appointment_id = Uuid::new_v4();

    let mut row = MockPostgrestResponses::appointment_response(
        &fixture.customer_id.to_string(),
        &fixture.staff_id.to_string(),
        &fixture.branch_id.to_string(),
        "2025-06-02",
        "10:00:00",
        "in_progress",
    );
    row["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&mock_server)
        .await;

    let mut cancelled = row.clone();
    cancelled["status"] = json!("cancelled");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    let service = booking_service(&mock_server);
    let appointment = service
        .cancel(appointment_id, Some("Customer emergency".to_string()), TOKEN)
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_twice_is_rejected() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();
    let appointment_id = Uuid::new_v4();

    let mut row = MockPostgrestResponses::appointment_response(
        &fixture.customer_id.to_string(),
        &fixture.staff_id.to_string(),
        &fixture.branch_id.to_string(),
        "2025-06-02",
        "10:00:00",
        "cancelled",
    );
    row["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let service = booking_service(&mock_server);
    let err = service.cancel(appointment_id, None, TOKEN).await.unwrap_err();

    assert_matches!(
        err,
        BookingError::InvalidStatusTransition(AppointmentStatus::Cancelled)
    );
}

#[tokio::test]
async fn reassigning_to_busy_staff_fails() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();
    let appointment_id = Uuid::new_v4();
    let new_staff_id = Uuid::new_v4();

    let mut row = MockPostgrestResponses::appointment_response(
        &fixture.customer_id.to_string(),
        &fixture.staff_id.to_string(),
        &fixture.branch_id.to_string(),
        "2025-06-02",
        "10:00:00",
        "scheduled",
    );
    row["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/business_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::business_hours_response(
                &fixture.branch_id.to_string(),
                1,
                "09:00:00",
                "20:00:00"
            )
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/holidays"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // The new staff member already has a non-cancelled appointment there.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("staff_id", format!("eq.{}", new_staff_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &new_staff_id.to_string(),
                &fixture.branch_id.to_string(),
                "2025-06-02",
                "10:00:00",
                "scheduled"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = booking_service(&mock_server);
    let err = service
        .reassign_staff(appointment_id, new_staff_id, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::SlotUnavailable(reason) if reason == "Slot already booked");
}

#[tokio::test]
async fn rating_requires_completion() {
    let mock_server = MockServer::start().await;
    let fixture = Fixture::new();
    let appointment_id = Uuid::new_v4();

    let mut row = MockPostgrestResponses::appointment_response(
        &fixture.customer_id.to_string(),
        &fixture.staff_id.to_string(),
        &fixture.branch_id.to_string(),
        "2025-06-02",
        "10:00:00",
        "scheduled",
    );
    row["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let service = booking_service(&mock_server);
    let err = service
        .rate(appointment_id, 5, None, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, BookingError::ValidationError(_));
}
