// libs/branch-cell/src/services/calendar.rs
use chrono::{Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    BranchError, BusinessHours, CreateHolidayRequest, DaySchedule, Holiday,
    SetBusinessHoursRequest,
};

/// Map a calendar date onto the 0 = Sunday .. 6 = Saturday row index.
pub fn day_of_week_index(date: NaiveDate) -> i32 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

pub struct CalendarService {
    supabase: SupabaseClient,
}

impl CalendarService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Upsert the weekly schedule row for (branch, weekday).
    ///
    /// Nothing is persisted when validation fails; the row is updated in
    /// place when one already exists for the weekday.
    pub async fn set_business_hours(
        &self,
        branch_id: Uuid,
        request: SetBusinessHoursRequest,
        auth_token: &str,
    ) -> Result<BusinessHours, BranchError> {
        debug!(
            "Setting business hours for branch {} day {}",
            branch_id, request.day_of_week
        );

        self.validate_business_hours(&request)?;

        let existing = self
            .get_hours_for_day(branch_id, request.day_of_week, auth_token)
            .await?;

        let now = Utc::now();
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static("return=representation"),
        );

        let result: Vec<Value> = if let Some(existing_row) = existing {
            let update_data = json!({
                "opening_time": request.opening_time.map(format_time),
                "closing_time": request.closing_time.map(format_time),
                "lunch_start": request.lunch_start.map(format_time),
                "lunch_end": request.lunch_end.map(format_time),
                "is_closed": request.is_closed,
                "updated_at": now.to_rfc3339()
            });

            let path = format!("/rest/v1/business_hours?id=eq.{}", existing_row.id);
            self.supabase
                .request_with_headers(Method::PATCH, &path, Some(auth_token), Some(update_data), Some(headers))
                .await
                .map_err(|e| BranchError::DatabaseError(e.to_string()))?
        } else {
            let insert_data = json!({
                "branch_id": branch_id,
                "day_of_week": request.day_of_week,
                "opening_time": request.opening_time.map(format_time),
                "closing_time": request.closing_time.map(format_time),
                "lunch_start": request.lunch_start.map(format_time),
                "lunch_end": request.lunch_end.map(format_time),
                "is_closed": request.is_closed,
                "created_at": now.to_rfc3339(),
                "updated_at": now.to_rfc3339()
            });

            self.supabase
                .request_with_headers(
                    Method::POST,
                    "/rest/v1/business_hours",
                    Some(auth_token),
                    Some(insert_data),
                    Some(headers),
                )
                .await
                .map_err(|e| BranchError::DatabaseError(e.to_string()))?
        };

        if result.is_empty() {
            return Err(BranchError::DatabaseError(
                "Failed to persist business hours".to_string(),
            ));
        }

        let hours: BusinessHours = serde_json::from_value(result[0].clone())
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse business hours: {}", e)))?;

        Ok(hours)
    }

    /// Weekly schedule for a branch, ordered by weekday.
    pub async fn get_business_hours(
        &self,
        branch_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<BusinessHours>, BranchError> {
        let path = format!(
            "/rest/v1/business_hours?branch_id=eq.{}&order=day_of_week.asc",
            branch_id
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        let hours: Vec<BusinessHours> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<BusinessHours>, _>>()
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse business hours: {}", e)))?;

        Ok(hours)
    }

    /// Resolve the calendar facts (weekday row + holiday) for one date.
    pub async fn day_schedule(
        &self,
        branch_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<DaySchedule, BranchError> {
        let hours = self
            .get_hours_for_day(branch_id, day_of_week_index(date), auth_token)
            .await?;
        let holiday = self.holiday_on(branch_id, date, auth_token).await?;

        Ok(DaySchedule {
            date,
            hours,
            holiday,
        })
    }

    /// True when the branch takes bookings on `date`: the weekday row is
    /// present and not closed, and no mandatory holiday falls on the date.
    pub async fn is_open_on_date(
        &self,
        branch_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<bool, BranchError> {
        Ok(self.day_schedule(branch_id, date, auth_token).await?.is_open())
    }

    pub async fn opening_time(
        &self,
        branch_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<NaiveTime>, BranchError> {
        Ok(self
            .day_schedule(branch_id, date, auth_token)
            .await?
            .opening_time())
    }

    pub async fn closing_time(
        &self,
        branch_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<NaiveTime>, BranchError> {
        Ok(self
            .day_schedule(branch_id, date, auth_token)
            .await?
            .closing_time())
    }

    pub async fn create_holiday(
        &self,
        branch_id: Uuid,
        request: CreateHolidayRequest,
        auth_token: &str,
    ) -> Result<Holiday, BranchError> {
        debug!(
            "Creating holiday {} for branch {} on {}",
            request.name, branch_id, request.holiday_date
        );

        if request.name.trim().is_empty() {
            return Err(BranchError::ValidationError(
                "Holiday name must not be empty".to_string(),
            ));
        }

        // One holiday row per branch-date keeps the calendar unambiguous.
        if self.holiday_on(branch_id, request.holiday_date, auth_token).await?.is_some() {
            return Err(BranchError::ValidationError(format!(
                "A holiday already exists for {}",
                request.holiday_date
            )));
        }

        let holiday_data = json!({
            "branch_id": branch_id,
            "holiday_date": request.holiday_date,
            "name": request.name,
            "is_optional": request.is_optional,
            "created_at": Utc::now().to_rfc3339()
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
                "/rest/v1/holidays",
                Some(auth_token),
                Some(holiday_data),
                Some(headers),
            )
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(BranchError::DatabaseError(
                "Failed to create holiday".to_string(),
            ));
        }

        let holiday: Holiday = serde_json::from_value(result[0].clone())
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse holiday: {}", e)))?;

        Ok(holiday)
    }

    pub async fn list_holidays(
        &self,
        branch_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        auth_token: &str,
    ) -> Result<Vec<Holiday>, BranchError> {
        let mut path = format!(
            "/rest/v1/holidays?branch_id=eq.{}&order=holiday_date.asc",
            branch_id
        );
        if let Some(from_date) = from {
            path.push_str(&format!("&holiday_date=gte.{}", from_date));
        }
        if let Some(to_date) = to {
            path.push_str(&format!("&holiday_date=lte.{}", to_date));
        }

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        let holidays: Vec<Holiday> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Holiday>, _>>()
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse holidays: {}", e)))?;

        Ok(holidays)
    }

    pub async fn delete_holiday(
        &self,
        branch_id: Uuid,
        holiday_id: Uuid,
        auth_token: &str,
    ) -> Result<(), BranchError> {
        debug!("Deleting holiday {} for branch {}", holiday_id, branch_id);

        let path = format!(
            "/rest/v1/holidays?id=eq.{}&branch_id=eq.{}",
            holiday_id, branch_id
        );
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn get_hours_for_day(
        &self,
        branch_id: Uuid,
        day_of_week: i32,
        auth_token: &str,
    ) -> Result<Option<BusinessHours>, BranchError> {
        let path = format!(
            "/rest/v1/business_hours?branch_id=eq.{}&day_of_week=eq.{}",
            branch_id, day_of_week
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        if result.len() > 1 {
            warn!(
                "Multiple business_hours rows for branch {} day {}, using first",
                branch_id, day_of_week
            );
        }

        let hours: BusinessHours = serde_json::from_value(result[0].clone())
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse business hours: {}", e)))?;

        Ok(Some(hours))
    }

    async fn holiday_on(
        &self,
        branch_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<Holiday>, BranchError> {
        let path = format!(
            "/rest/v1/holidays?branch_id=eq.{}&holiday_date=eq.{}",
            branch_id, date
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| BranchError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Ok(None);
        }

        let holiday: Holiday = serde_json::from_value(result[0].clone())
            .map_err(|e| BranchError::DatabaseError(format!("Failed to parse holiday: {}", e)))?;

        Ok(Some(holiday))
    }

    fn validate_business_hours(&self, request: &SetBusinessHoursRequest) -> Result<(), BranchError> {
        if request.day_of_week < 0 || request.day_of_week > 6 {
            return Err(BranchError::ValidationError(
                "Day of week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
            ));
        }

        if request.is_closed {
            return Ok(());
        }

        let (opening, closing) = match (request.opening_time, request.closing_time) {
            (Some(opening), Some(closing)) => (opening, closing),
            _ => {
                return Err(BranchError::ValidationError(
                    "Opening and closing times are required when the day is not closed".to_string(),
                ));
            }
        };

        if closing <= opening {
            return Err(BranchError::ValidationError(
                "Closing time must be after opening time".to_string(),
            ));
        }

        match (request.lunch_start, request.lunch_end) {
            (None, None) => {}
            (Some(lunch_start), Some(lunch_end)) => {
                if lunch_end <= lunch_start {
                    return Err(BranchError::ValidationError(
                        "Lunch end must be after lunch start".to_string(),
                    ));
                }
                if lunch_start < opening || lunch_end > closing {
                    return Err(BranchError::ValidationError(
                        "Lunch break must fall within opening hours".to_string(),
                    ));
                }
            }
            _ => {
                return Err(BranchError::ValidationError(
                    "Lunch start and lunch end must be provided together".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}
