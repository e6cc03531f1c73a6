//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods
//! that accept `&PgPool` as the first argument.

pub mod activity_event_repo;
pub mod alert_notification_repo;
pub mod alert_repo;
pub mod baseline_repo;
pub mod check_in_repo;
pub mod device_repo;
pub mod family_member_repo;
pub mod hub_repo;
pub mod user_repo;

pub use activity_event_repo::ActivityEventRepo;
pub use alert_notification_repo::AlertNotificationRepo;
pub use alert_repo::AlertRepo;
pub use baseline_repo::BaselineRepo;
pub use check_in_repo::CheckInRepo;
pub use device_repo::DeviceRepo;
pub use family_member_repo::FamilyMemberRepo;
pub use hub_repo::HubRepo;
pub use user_repo::UserRepo;
