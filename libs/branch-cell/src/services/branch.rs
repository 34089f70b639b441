// libs/branch-cell/src/services/branch.rs
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Branch, BranchError, CreateBranchRequest, UpdateBranchRequest};

pub struct BranchService {
    supabase: SupabaseClient,
}

impl BranchService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_branch(
        &self,
        request: CreateBranchRequest,
        auth_token: &str,
    ) -> Result<Branch, BranchError> {
        debug!("Creating branch: {}", request.name);

        if request.name.trim().is_empty() {
            return Err(BranchError::ValidationError(
                "Branch name must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let branch_data = json!({
            "name": request.name,
            "address": request.address,
            "phone": request.phone,
            "email": request.email,
            "is_active": true,
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
                "/rest/v1/branches",
                Some(auth_token),
                Some(branch_data),
                Some(headers),
            )
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BranchError::DatabaseError(
                "Failed to create branch".to_string(),
            ));
        }

        let branch: Branch = serde_json::from_value(result[0].clone())
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse branch: {}", e)))?;

        Ok(branch)
    }

    pub async fn update_branch(
        &self,
        branch_id: Uuid,
        request: UpdateBranchRequest,
        auth_token: &str,
    ) -> Result<Branch, BranchError> {
        debug!("Updating branch: {}", branch_id);

        // Ensure the branch exists before patching.
        self.get_branch(branch_id, auth_token).await?;

        let mut update_data = serde_json::Map::new();
        if let Some(name) = request.name {
            if name.trim().is_empty() {
                return Err(BranchError::ValidationError(
                    "Branch name must not be empty".to_string(),
                ));
            }
            update_data.insert("name".to_string(), json!(name));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(is_active) = request.is_active {
            update_data.insert("is_active".to_string(), json!(is_active));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/branches?id=eq.{}", branch_id);
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
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BranchError::DatabaseError(
                "Failed to update branch".to_string(),
            ));
        }

        let branch: Branch = serde_json::from_value(result[0].clone())
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse branch: {}", e)))?;

        Ok(branch)
    }

    pub async fn get_branch(&self, branch_id: Uuid, auth_token: &str) -> Result<Branch, BranchError> {
        let path = format!("/rest/v1/branches?id=eq.{}", branch_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BranchError::NotFound);
        }

        let branch: Branch = serde_json::from_value(result[0].clone())
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse branch: {}", e)))?;

        Ok(branch)
    }

    pub async fn list_branches(&self, auth_token: &str) -> Result<Vec<Branch>, BranchError> {
        let path = "/rest/v1/branches?is_active=eq.true&order=name.asc";
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        let branches: Vec<Branch> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Branch>, _>>()
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse branches: {}", e)))?;

        Ok(branches)
    }
}
