// libs/staff-cell/src/services/staff.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{CreateStaffRequest, Staff, StaffBranch, StaffError, UpdateStaffRequest};

pub struct StaffService {
    supabase: SupabaseClient,
}

impl StaffService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a staff profile and its primary branch affiliation.
    pub async fn create_staff(
        &self,
        request: CreateStaffRequest,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        debug!(
            "Creating staff profile for user {} at branch {}",
            request.user_id, request.branch_id
        );

        if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
            return Err(StaffError::ValidationError(
                "Staff first and last name must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let staff_data = json!({
            "user_id": request.user_id,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "specialization": request.specialization,
            "is_available": true,
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
                "/rest/v1/staff",
                Some(auth_token),
                Some(staff_data),
                Some(headers.clone()),
            )
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::DatabaseError(
                "Failed to create staff profile".to_string(),
            ));
        }

        let staff: Staff = serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff: {}", e)))?;

        let affiliation_data = json!({
            "staff_id": staff.id,
            "branch_id": request.branch_id,
            "is_primary": true
        });

        let _: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/staff_branches",
                Some(auth_token),
                Some(affiliation_data),
                Some(headers),
            )
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        Ok(staff)
    }

    pub async fn update_staff(
        &self,
        staff_id: Uuid,
        request: UpdateStaffRequest,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        debug!("Updating staff: {}", staff_id);

        self.get_staff(staff_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(specialization) = request.specialization {
            update_data.insert("specialization".to_string(), json!(specialization));
        }
        if let Some(is_available) = request.is_available {
            update_data.insert("is_available".to_string(), json!(is_available));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/staff?id=eq.{}", staff_id);
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                Some(headers),
            )
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::DatabaseError(
                "Failed to update staff".to_string(),
            ));
        }

        let staff: Staff = serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff: {}", e)))?;

        Ok(staff)
    }

    pub async fn get_staff(&self, staff_id: Uuid, auth_token: &str) -> Result<Staff, StaffError> {
        let path = format!("/rest/v1/staff?id=eq.{}", staff_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::NotFound);
        }

        let staff: Staff = serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff: {}", e)))?;

        Ok(staff)
    }

    /// Resolve the staff profile backing an authenticated user account.
    pub async fn get_staff_by_user(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Staff, StaffError> {
        let path = format!("/rest/v1/staff?user_id=eq.{}", user_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(StaffError::NotFound);
        }

        let staff: Staff = serde_json::from_value(result[0].clone())
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff: {}", e)))?;

        Ok(staff)
    }

    /// List staff, optionally restricted to one branch via the affiliation
    /// table.
    pub async fn list_staff(
        &self,
        branch_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Staff>, StaffError> {
        let path = match branch_id {
            Some(branch_id) => {
                let affiliations = self.get_branch_affiliations(branch_id, auth_token).await?;
                if affiliations.is_empty() {
                    return Ok(vec![]);
                }
                let ids: Vec<String> = affiliations
                    .iter()
                    .map(|a| a.staff_id.to_string())
                    .collect();
                format!(
                    "/rest/v1/staff?id=in.({})&order=last_name.asc",
                    ids.join(",")
                )
            }
            None => "/rest/v1/staff?order=last_name.asc".to_string(),
        };

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let staff: Vec<Staff> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Staff>, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse staff list: {}", e)))?;

        Ok(staff)
    }

    /// True when the staff member works at the branch.
    pub async fn is_affiliated_with_branch(
        &self,
        staff_id: Uuid,
        branch_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, StaffError> {
        let path = format!(
            "/rest/v1/staff_branches?staff_id=eq.{}&branch_id=eq.{}",
            staff_id, branch_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn get_branch_affiliations(
        &self,
        branch_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<StaffBranch>, StaffError> {
        let path = format!("/rest/v1/staff_branches?branch_id=eq.{}", branch_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| StaffError::DatabaseError(e.to_string()))?;

        let affiliations: Vec<StaffBranch> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<StaffBranch>, _>>()
            .map_err(|e| StaffError::DatabaseError(format!("Failed to parse affiliations: {}", e)))?;

        Ok(affiliations)
    }
}
