use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::{MockPostgrestResponses, TestConfig};
use staff_cell::models::{LeaveStatus, StaffError, SubmitLeaveRequest};
use staff_cell::services::LeaveService;

const TOKEN: &str = "test-token";

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn leave_service(mock_server: &MockServer) -> LeaveService {
    LeaveService::new(&TestConfig::with_base_url(&mock_server.uri()).to_app_config())
}

#[tokio::test]
async fn submit_leave_request_succeeds_when_no_overlap() {
    let mock_server = MockServer::start().await;
    let staff_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .and(query_param("status", "neq.rejected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/leave_requests"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockPostgrestResponses::leave_request_response(
                &staff_id.to_string(),
                "2025-07-01",
                "2025-07-05",
                "pending"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = leave_service(&mock_server);
    let leave = service
        .submit_leave_request(
            staff_id,
            SubmitLeaveRequest {
                start_date: d("2025-07-01"),
                end_date: d("2025-07-05"),
                reason: Some("Annual leave".to_string()),
            },
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(leave.status, LeaveStatus::Pending);
    assert_eq!(leave.start_date, d("2025-07-01"));
    assert_eq!(leave.end_date, d("2025-07-05"));
}

#[tokio::test]
async fn overlapping_request_is_rejected_while_first_is_not_rejected() {
    // Scenario: pending leave 2025-07-01..05 exists; a second request for
    // 2025-07-03..04 overlaps and must fail.
    let mock_server = MockServer::start().await;
    let staff_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .and(query_param("staff_id", format!("eq.{}", staff_id)))
        .and(query_param("status", "neq.rejected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::leave_request_response(
                &staff_id.to_string(),
                "2025-07-01",
                "2025-07-05",
                "pending"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = leave_service(&mock_server);
    let err = service
        .submit_leave_request(
            staff_id,
            SubmitLeaveRequest {
                start_date: d("2025-07-03"),
                end_date: d("2025-07-04"),
                reason: None,
            },
            TOKEN,
        )
        .await
        .unwrap_err();

    assert_matches!(err, StaffError::Conflict(_));

    // The overlap must short-circuit before any insert.
    let posts: Vec<_> = mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.to_string().eq_ignore_ascii_case("post"))
        .collect();
    assert!(posts.is_empty());
}

#[tokio::test]
async fn touching_date_ranges_count_as_overlap() {
    let mock_server = MockServer::start().await;
    let staff_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::leave_request_response(
                &staff_id.to_string(),
                "2025-07-01",
                "2025-07-05",
                "approved"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = leave_service(&mock_server);
    let err = service
        .submit_leave_request(
            staff_id,
            SubmitLeaveRequest {
                start_date: d("2025-07-05"),
                end_date: d("2025-07-08"),
                reason: None,
            },
            TOKEN,
        )
        .await
        .unwrap_err();

    assert_matches!(err, StaffError::Conflict(_));
}

#[tokio::test]
async fn rejected_requests_free_their_dates() {
    // The overlap query filters on status=neq.rejected, so a rejected
    // request never comes back and the same dates can be resubmitted.
    let mock_server = MockServer::start().await;
    let staff_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .and(query_param("status", "neq.rejected"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/leave_requests"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockPostgrestResponses::leave_request_response(
                &staff_id.to_string(),
                "2025-07-01",
                "2025-07-05",
                "pending"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = leave_service(&mock_server);
    let resubmitted = service
        .submit_leave_request(
            staff_id,
            SubmitLeaveRequest {
                start_date: d("2025-07-01"),
                end_date: d("2025-07-05"),
                reason: None,
            },
            TOKEN,
        )
        .await
        .unwrap();

    assert_eq!(resubmitted.status, LeaveStatus::Pending);
}

#[tokio::test]
async fn end_before_start_is_rejected() {
    let mock_server = MockServer::start().await;
    let service = leave_service(&mock_server);

    let err = service
        .submit_leave_request(
            Uuid::new_v4(),
            SubmitLeaveRequest {
                start_date: d("2025-07-05"),
                end_date: d("2025-07-01"),
                reason: None,
            },
            TOKEN,
        )
        .await
        .unwrap_err();

    assert_matches!(err, StaffError::ValidationError(_));
}

#[tokio::test]
async fn decide_approves_a_pending_request() {
    let mock_server = MockServer::start().await;
    let staff_id = Uuid::new_v4();
    let request_id = Uuid::new_v4();
    let approver_id = Uuid::new_v4();

    let mut pending = MockPostgrestResponses::leave_request_response(
        &staff_id.to_string(),
        "2025-07-01",
        "2025-07-05",
        "pending",
    );
    pending["id"] = json!(request_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .and(query_param("id", format!("eq.{}", request_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([pending.clone()])))
        .mount(&mock_server)
        .await;

    let mut approved = pending.clone();
    approved["status"] = json!("approved");
    approved["decided_by"] = json!(approver_id);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/leave_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([approved])))
        .mount(&mock_server)
        .await;

    let service = leave_service(&mock_server);
    let decided = service
        .decide(request_id, approver_id, true, None, TOKEN)
        .await
        .unwrap();

    assert_eq!(decided.status, LeaveStatus::Approved);
    assert_eq!(decided.decided_by, Some(approver_id));
}

#[tokio::test]
async fn decided_requests_cannot_be_decided_twice() {
    let mock_server = MockServer::start().await;
    let staff_id = Uuid::new_v4();
    let request_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::leave_request_response(
                &staff_id.to_string(),
                "2025-07-01",
                "2025-07-05",
                "approved"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = leave_service(&mock_server);
    let err = service
        .decide(request_id, Uuid::new_v4(), false, None, TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, StaffError::LeaveRequestNotFound);
}

#[tokio::test]
async fn is_staff_on_leave_reflects_approved_intervals() {
    let mock_server = MockServer::start().await;
    let staff_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .and(query_param("status", "eq.approved"))
        .and(query_param("start_date", "lte.2025-06-11"))
        .and(query_param("end_date", "gte.2025-06-11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::leave_request_response(
                &staff_id.to_string(),
                "2025-06-10",
                "2025-06-12",
                "approved"
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/leave_requests"))
        .and(query_param("start_date", "lte.2025-06-20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = leave_service(&mock_server);
    assert!(service
        .is_staff_on_leave(staff_id, d("2025-06-11"), TOKEN)
        .await
        .unwrap());
    assert!(!service
        .is_staff_on_leave(staff_id, d("2025-06-20"), TOKEN)
        .await
        .unwrap());
}
