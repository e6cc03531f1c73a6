//! The stateful side of the alerting pipeline.
//!
//! - [`ingest::EventPipeline`]: hub message dispatch and the
//!   classify-store-alert unit for device events.
//! - [`alerts::AlertManager`]: alert creation with duplicate suppression,
//!   family responses, emergencies and the escalation sweep.
//! - [`fanout::NotificationFanout`]: per-member, per-channel delivery with a
//!   logged outcome for every attempt.
//! - [`inactivity::InactivitySweep`] and [`baseline::BaselineRebuilder`]:
//!   the periodic per-hub evaluators.
//! - [`summary::ActivitySummaries`]: daily and weekly dashboard summaries and
//!   the opt-in daily summary digest.
//!
//! All services reach persistence through [`store::PipelineStore`] and hold
//! no mutable state of their own.

pub mod alerts;
pub mod baseline;
pub mod error;
pub mod fanout;
pub mod inactivity;
pub mod ingest;
pub mod store;
pub mod summary;

pub use alerts::{AlertManager, EscalationReport};
pub use baseline::BaselineRebuilder;
pub use error::{PipelineError, PipelineResult};
pub use fanout::{FanoutReport, NotificationFanout};
pub use inactivity::{InactivitySweep, InactivitySweepReport};
pub use ingest::{EventPipeline, ProcessedEvent};
pub use store::{MemoryStore, PgStore, PipelineStore};
pub use summary::{ActivitySummaries, DigestReport};
