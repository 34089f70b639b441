// libs/appointment-cell/src/services/catalog.rs
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{BookingError, SalonService};

/// Read-side view of the service catalog, consulted at booking time to
/// snapshot per-service prices onto the appointment.
pub struct ServiceCatalog {
    supabase: Arc<SupabaseClient>,
}

impl ServiceCatalog {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Fetch the requested services, failing when any id is unknown or
    /// inactive — a booking must never snapshot a price for a service the
    /// salon no longer offers.
    pub async fn get_bookable_services(
        &self,
        service_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<Vec<SalonService>, BookingError> {
        if service_ids.is_empty() {
            return Err(BookingError::ValidationError(
                "At least one service must be selected".to_string(),
            ));
        }

        let ids: Vec<String> = service_ids.iter().map(|id| id.to_string()).collect();
        let path = format!("/rest/v1/services?id=in.({})", ids.join(","));

        debug!("Fetching {} catalog services", service_ids.len());

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let services: Vec<SalonService> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<SalonService>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse services: {}", e)))?;

        if services.len() != service_ids.len() {
            return Err(BookingError::ValidationError(
                "One or more selected services do not exist".to_string(),
            ));
        }

        if let Some(inactive) = services.iter().find(|s| !s.is_active) {
            return Err(BookingError::ValidationError(format!(
                "Service '{}' is no longer offered",
                inactive.name
            )));
        }

        Ok(services)
    }
}
