use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            supabase_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "customer".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn customer(email: &str) -> Self {
        Self::new(email, "customer")
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, "staff")
    }

    pub fn receptionist(email: &str) -> Self {
        Self::new(email, "receptionist")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockPostgrestResponses;

impl MockPostgrestResponses {
    pub fn branch_response(branch_id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": branch_id,
            "name": name,
            "address": "12 High Street",
            "phone": "+44 20 7946 0000",
            "email": "branch@example.com",
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn business_hours_response(
        branch_id: &str,
        day_of_week: i32,
        opening: &str,
        closing: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "branch_id": branch_id,
            "day_of_week": day_of_week,
            "opening_time": opening,
            "closing_time": closing,
            "lunch_start": null,
            "lunch_end": null,
            "is_closed": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn closed_day_response(branch_id: &str, day_of_week: i32) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "branch_id": branch_id,
            "day_of_week": day_of_week,
            "opening_time": null,
            "closing_time": null,
            "lunch_start": null,
            "lunch_end": null,
            "is_closed": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn holiday_response(
        branch_id: &str,
        date: &str,
        name: &str,
        is_optional: bool,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "branch_id": branch_id,
            "holiday_date": date,
            "name": name,
            "is_optional": is_optional,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn staff_response(staff_id: &str, first_name: &str, last_name: &str) -> serde_json::Value {
        json!({
            "id": staff_id,
            "user_id": Uuid::new_v4(),
            "first_name": first_name,
            "last_name": last_name,
            "specialization": "Stylist",
            "is_available": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn leave_request_response(
        staff_id: &str,
        start_date: &str,
        end_date: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "staff_id": staff_id,
            "start_date": start_date,
            "end_date": end_date,
            "reason": "Annual leave",
            "status": status,
            "decided_by": null,
            "rejection_reason": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn service_response(service_id: &str, name: &str, price: f64) -> serde_json::Value {
        json!({
            "id": service_id,
            "name": name,
            "price": price,
            "duration_minutes": 45,
            "is_active": true
        })
    }

    pub fn appointment_response(
        customer_id: &str,
        staff_id: &str,
        branch_id: &str,
        date: &str,
        time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "customer_id": customer_id,
            "staff_id": staff_id,
            "branch_id": branch_id,
            "appointment_date": date,
            "appointment_time": time,
            "status": status,
            "payment_status": "unpaid",
            "payment_method": null,
            "notes": null,
            "rating": null,
            "review": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }
}
