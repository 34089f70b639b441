use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Datelike, Duration, Utc};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockPostgrestResponses, TestConfig, TestUser};

fn test_config(mock_server: &MockServer) -> TestConfig {
    TestConfig::with_base_url(&mock_server.uri())
}

fn create_test_app(config: AppConfig) -> Router {
    appointment_routes(Arc::new(config))
}

fn bearer(config: &TestConfig, user: &TestUser) -> String {
    format!(
        "Bearer {}",
        JwtTestUtils::create_test_token(user, &config.jwt_secret, Some(1))
    )
}

/// Tomorrow plus the weekday index the business_hours table keys on.
fn tomorrow() -> (chrono::NaiveDate, i32) {
    let date = Utc::now().date_naive() + Duration::days(1);
    (date, date.weekday().num_days_from_sunday() as i32)
}

async fn mount_open_calendar(mock_server: &MockServer, branch_id: &str, day_of_week: i32) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/business_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::business_hours_response(branch_id, day_of_week, "09:00:00", "20:00:00")
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

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/upcoming")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn availability_endpoint_returns_verdict_with_window() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let branch_id = Uuid::new_v4();
    let staff_id = Uuid::new_v4();
    let (date, day_of_week) = tomorrow();

    mount_open_calendar(&mock_server, &branch_id.to_string(), day_of_week).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let customer = TestUser::customer("customer@example.com");
    let app = create_test_app(config.to_app_config());

    let uri = format!(
        "/availability?branch_id={}&staff_id={}&date={}&time=10:00:00",
        branch_id, staff_id, date
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("Authorization", bearer(&config, &customer))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let verdict: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(verdict["available"], json!(true));
    assert_eq!(verdict["opening_time"], json!("09:00:00"));
    assert_eq!(verdict["closing_time"], json!("20:00:00"));
}

#[tokio::test]
async fn booking_a_taken_slot_returns_409_with_reason() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let branch_id = Uuid::new_v4();
    let staff_id = Uuid::new_v4();
    let service_id = Uuid::new_v4();
    let (date, day_of_week) = tomorrow();
    let customer = TestUser::customer("customer@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::branch_response(&branch_id.to_string(), "Downtown")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::staff_response(&staff_id.to_string(), "Mia", "Laine")
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/staff_branches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": Uuid::new_v4(), "staff_id": staff_id, "branch_id": branch_id, "is_primary": true }
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::service_response(&service_id.to_string(), "Haircut", 42.5)
        ])))
        .mount(&mock_server)
        .await;
    mount_open_calendar(&mock_server, &branch_id.to_string(), day_of_week).await;

    // Slot occupied by someone else.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "neq.cancelled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::appointment_response(
                &Uuid::new_v4().to_string(),
                &staff_id.to_string(),
                &branch_id.to_string(),
                &date.to_string(),
                "10:00:00",
                "scheduled"
            )
        ])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(config.to_app_config());
    let request_body = json!({
        "branch_id": branch_id,
        "staff_id": staff_id,
        "date": date,
        "time": "10:00:00",
        "service_ids": [service_id]
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Authorization", bearer(&config, &customer))
                .header("Content-Type", "application/json")
                .body(Body::from(request_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], json!("Slot already booked"));
}

#[tokio::test]
async fn illegal_status_transition_returns_422() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let appointment_id = Uuid::new_v4();

    let mut row = MockPostgrestResponses::appointment_response(
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
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

    let receptionist = TestUser::receptionist("desk@example.com");
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/{}/status", appointment_id))
                .header("Authorization", bearer(&config, &receptionist))
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "status": "scheduled" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn customers_cannot_decide_reschedule_requests() {
    let mock_server = MockServer::start().await;
    let config = test_config(&mock_server);
    let customer = TestUser::customer("customer@example.com");
    let app = create_test_app(config.to_app_config());

    let response = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri(format!("/reschedule-requests/{}", Uuid::new_v4()))
                .header("Authorization", bearer(&config, &customer))
                .header("Content-Type", "application/json")
                .body(Body::from(json!({ "status": "approved" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
