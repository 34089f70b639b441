use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use branch_cell::models::{BranchError, CreateHolidayRequest, SetBusinessHoursRequest};
use branch_cell::services::CalendarService;
use shared_utils::test_utils::{MockPostgrestResponses, TestConfig};

const TOKEN: &str = "test-token";

fn t(s: &str) -> NaiveTime {
    s.parse().unwrap()
}

fn calendar(mock_server: &MockServer) -> CalendarService {
    CalendarService::new(&TestConfig::with_base_url(&mock_server.uri()).to_app_config())
}

fn hours_request(opening: &str, closing: &str) -> SetBusinessHoursRequest {
    SetBusinessHoursRequest {
        day_of_week: 1,
        opening_time: Some(t(opening)),
        closing_time: Some(t(closing)),
        lunch_start: None,
        lunch_end: None,
        is_closed: false,
    }
}

#[tokio::test]
async fn invalid_time_ordering_persists_nothing() {
    let mock_server = MockServer::start().await;
    let service = calendar(&mock_server);

    let err = service
        .set_business_hours(Uuid::new_v4(), hours_request("20:00:00", "09:00:00"), TOKEN)
        .await
        .unwrap_err();

    assert_matches!(err, BranchError::ValidationError(_));

    // Validation fails before any request reaches the store.
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn upsert_inserts_when_no_weekday_row_exists() {
    let mock_server = MockServer::start().await;
    let branch_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/business_hours"))
        .and(query_param("day_of_week", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/business_hours"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockPostgrestResponses::business_hours_response(
                &branch_id.to_string(),
                1,
                "09:00:00",
                "20:00:00"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = calendar(&mock_server);
    let hours = service
        .set_business_hours(branch_id, hours_request("09:00:00", "20:00:00"), TOKEN)
        .await
        .unwrap();

    assert_eq!(hours.day_of_week, 1);
    assert_eq!(hours.opening_time, Some(t("09:00:00")));
    assert_eq!(hours.closing_time, Some(t("20:00:00")));
}

#[tokio::test]
async fn upsert_patches_the_existing_weekday_row() {
    let mock_server = MockServer::start().await;
    let branch_id = Uuid::new_v4();
    let existing = MockPostgrestResponses::business_hours_response(
        &branch_id.to_string(),
        1,
        "09:00:00",
        "18:00:00",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/business_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([existing])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/business_hours"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::business_hours_response(
                &branch_id.to_string(),
                1,
                "09:00:00",
                "20:00:00"
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = calendar(&mock_server);
    let hours = service
        .set_business_hours(branch_id, hours_request("09:00:00", "20:00:00"), TOKEN)
        .await
        .unwrap();

    assert_eq!(hours.closing_time, Some(t("20:00:00")));

    // One upsert, not a second insert.
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
async fn duplicate_holiday_date_is_rejected() {
    let mock_server = MockServer::start().await;
    let branch_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/holidays"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::holiday_response(
                &branch_id.to_string(),
                "2025-12-25",
                "Christmas",
                false
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = calendar(&mock_server);
    let err = service
        .create_holiday(
            branch_id,
            CreateHolidayRequest {
                holiday_date: NaiveDate::from_ymd_opt(2025, 12, 25).unwrap(),
                name: "Boxing Day Eve".to_string(),
                is_optional: false,
            },
            TOKEN,
        )
        .await
        .unwrap_err();

    assert_matches!(err, BranchError::ValidationError(_));
}

#[tokio::test]
async fn day_schedule_combines_hours_and_holiday() {
    let mock_server = MockServer::start().await;
    let branch_id = Uuid::new_v4();
    // 2025-12-25 is a Thursday (day 4).
    let date = NaiveDate::from_ymd_opt(2025, 12, 25).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/business_hours"))
        .and(query_param("day_of_week", "eq.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::business_hours_response(
                &branch_id.to_string(),
                4,
                "09:00:00",
                "20:00:00"
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/holidays"))
        .and(query_param("holiday_date", "eq.2025-12-25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockPostgrestResponses::holiday_response(
                &branch_id.to_string(),
                "2025-12-25",
                "Christmas",
                false
            )
        ])))
        .mount(&mock_server)
        .await;

    let service = calendar(&mock_server);
    let schedule = service.day_schedule(branch_id, date, TOKEN).await.unwrap();

    assert!(!schedule.is_open());
    assert_eq!(schedule.opening_time(), None);
    assert_eq!(schedule.closing_time(), None);
    assert!(!service.is_open_on_date(branch_id, date, TOKEN).await.unwrap());
}
