// libs/appointment-cell/src/services/ledger.rs
use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentSearchQuery, BookedService, BookingError};

/// Pure storage and query layer over appointment rows. Interpreting a
/// conflict is the availability resolver's job; nothing here mutates state.
pub struct BookingLedger {
    supabase: Arc<SupabaseClient>,
}

impl BookingLedger {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// The non-cancelled appointment occupying (staff, date, time), if any.
    /// `exclude_appointment_id` lets a reschedule ignore its own row.
    pub async fn find_conflict(
        &self,
        staff_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Option<Appointment>, BookingError> {
        debug!(
            "Checking slot occupancy for staff {} on {} at {}",
            staff_id, date, time
        );

        let mut query_parts = vec![
            format!("staff_id=eq.{}", staff_id),
            format!("appointment_date=eq.{}", date),
            format!("appointment_time=eq.{}", time.format("%H:%M:%S")),
            "status=neq.cancelled".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        Ok(Some(appointment))
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BookingError::NotFound);
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointment: {}", e)))?;

        Ok(appointment)
    }

    pub async fn get_booked_services(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<BookedService>, BookingError> {
        let path = format!(
            "/rest/v1/appointment_services?appointment_id=eq.{}",
            appointment_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let services: Vec<BookedService> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BookedService>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse booked services: {}", e)))?;

        Ok(services)
    }

    /// Search appointments with filters
    pub async fn search(
        &self,
        query: AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        debug!("Searching appointments with filters: {:?}", query);

        let mut query_parts = Vec::new();

        if let Some(branch_id) = query.branch_id {
            query_parts.push(format!("branch_id=eq.{}", branch_id));
        }
        if let Some(staff_id) = query.staff_id {
            query_parts.push(format!("staff_id=eq.{}", staff_id));
        }
        if let Some(customer_id) = query.customer_id {
            query_parts.push(format!("customer_id=eq.{}", customer_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            query_parts.push(format!("appointment_date=gte.{}", from_date));
        }
        if let Some(to_date) = query.to_date {
            query_parts.push(format!("appointment_date=lte.{}", to_date));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=appointment_date.desc,appointment_time.desc",
            query_parts.join("&")
        );

        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        let appointments: Vec<Appointment> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| BookingError::DatabaseError(format!("Failed to parse appointments: {}", e)))?;

        Ok(appointments)
    }

    pub async fn list_by_branch(
        &self,
        branch_id: Uuid,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        self.search(
            AppointmentSearchQuery {
                branch_id: Some(branch_id),
                staff_id: None,
                customer_id: None,
                status: None,
                from_date,
                to_date,
                limit: None,
                offset: None,
            },
            auth_token,
        )
        .await
    }

    pub async fn list_by_staff(
        &self,
        staff_id: Uuid,
        from_date: Option<NaiveDate>,
        to_date: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, BookingError> {
        self.search(
            AppointmentSearchQuery {
                branch_id: None,
                staff_id: Some(staff_id),
                customer_id: None,
                status: None,
                from_date,
                to_date,
                limit: None,
                offset: None,
            },
            auth_token,
        )
        .await
    }
}
