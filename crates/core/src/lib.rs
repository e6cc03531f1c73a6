//! Pure domain logic for the SafeHome aged-care alerting pipeline.
//!
//! Nothing in this crate performs I/O. The database, delivery and worker
//! crates gather facts and hand them to the functions here for decisions.

pub mod activity;
pub mod alert;
pub mod anomaly;
pub mod baseline;
pub mod channels;
pub mod error;
pub mod escalation;
pub mod hub_config;
pub mod inactivity;
pub mod messages;
pub mod notification;
pub mod summary;
pub mod types;
