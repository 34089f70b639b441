pub mod leave;
pub mod staff;

pub use leave::LeaveService;
pub use staff::StaffService;
