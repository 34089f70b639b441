// libs/appointment-cell/src/services/availability.rs
use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use branch_cell::services::CalendarService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::{Clock, SystemClock};
use staff_cell::services::LeaveService;

use crate::models::{AvailabilityVerdict, BookingError};
use crate::services::ledger::BookingLedger;

/// The single decision function consulted before every booking-affecting
/// mutation. Checks run in order and short-circuit on the first failure so
/// the verdict carries the most specific reason:
///
/// 1. the date is not in the past (same-day booking is allowed)
/// 2. the branch is open that weekday and the date is not a mandatory holiday
/// 3. the time falls inside opening hours and outside the lunch window
/// 4. the staff member is not on approved leave
/// 5. no non-cancelled appointment occupies the slot
///
/// The check is pure and idempotent — it reserves nothing. The write path
/// closes the remaining check-then-act window against the partial unique
/// index on (staff_id, appointment_date, appointment_time).
pub struct AvailabilityService {
    calendar: CalendarService,
    leave: LeaveService,
    ledger: BookingLedger,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            calendar: CalendarService::new(config),
            leave: LeaveService::new(config),
            ledger: BookingLedger::new(supabase),
            clock,
        }
    }

    pub async fn check_availability(
        &self,
        branch_id: Uuid,
        staff_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        exclude_appointment_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<AvailabilityVerdict, BookingError> {
        debug!(
            "Checking availability for staff {} at branch {} on {} {}",
            staff_id, branch_id, date, time
        );

        // 1. No bookings in the past; today is still bookable.
        if date < self.clock.today() {
            return Ok(AvailabilityVerdict::unavailable(
                "Booking date cannot be in the past",
                None,
                None,
            ));
        }

        // 2. Branch calendar: weekday schedule and mandatory holidays.
        let schedule = self
            .calendar
            .day_schedule(branch_id, date, auth_token)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if !schedule.is_open() {
            let reason = match &schedule.holiday {
                Some(holiday) if !holiday.is_optional => {
                    format!("Salon is closed for {}", holiday.name)
                }
                _ => "Salon is closed on this day".to_string(),
            };
            return Ok(AvailabilityVerdict::unavailable(reason, None, None));
        }

        let opening = schedule.opening_time();
        let closing = schedule.closing_time();

        // 3. Requested time must fall within [opening, closing) and outside
        //    the lunch window.
        if let (Some(opening_time), Some(closing_time)) = (opening, closing) {
            if time < opening_time || time >= closing_time {
                return Ok(AvailabilityVerdict::unavailable(
                    format!(
                        "Salon is open from {} to {}",
                        opening_time.format("%H:%M"),
                        closing_time.format("%H:%M")
                    ),
                    opening,
                    closing,
                ));
            }

            if let Some((lunch_start, lunch_end)) = schedule.lunch_window() {
                if time >= lunch_start && time < lunch_end {
                    return Ok(AvailabilityVerdict::unavailable(
                        format!(
                            "Salon is closed for lunch from {} to {}",
                            lunch_start.format("%H:%M"),
                            lunch_end.format("%H:%M")
                        ),
                        opening,
                        closing,
                    ));
                }
            }
        }

        // 4. Approved leave removes the staff member from the bookable pool.
        let on_leave = self
            .leave
            .is_staff_on_leave(staff_id, date, auth_token)
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        if on_leave {
            return Ok(AvailabilityVerdict::unavailable(
                "Staff unavailable (on leave)",
                opening,
                closing,
            ));
        }

        // 5. The slot must be free of non-cancelled appointments.
        let conflict = self
            .ledger
            .find_conflict(staff_id, date, time, exclude_appointment_id, auth_token)
            .await?;

        if conflict.is_some() {
            return Ok(AvailabilityVerdict::unavailable(
                "Slot already booked",
                opening,
                closing,
            ));
        }

        Ok(AvailabilityVerdict::available(opening, closing))
    }
}
