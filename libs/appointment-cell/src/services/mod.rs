pub mod availability;
pub mod booking;
pub mod catalog;
pub mod ledger;
pub mod lifecycle;
pub mod reschedule;

pub use availability::AvailabilityService;
pub use booking::BookingService;
pub use catalog::ServiceCatalog;
pub use ledger::BookingLedger;
pub use lifecycle::AppointmentLifecycle;
pub use reschedule::RescheduleService;
