//! Real-time fan-out and outbound notification channels.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`, carrying [`RealtimeMessage`]s addressed to a
//!   family room or a single account.
//! - [`delivery`]: the per-channel senders (push, email, SMS/voice gateway)
//!   behind the [`ChannelSender`] seam.

pub mod bus;
pub mod delivery;

pub use bus::{AlertEvent, Audience, EventBus, RealtimeMessage};
pub use delivery::email::{EmailConfig, EmailDelivery};
pub use delivery::gateway::{GatewayConfig, GatewayDelivery};
pub use delivery::push::PushDelivery;
pub use delivery::{ChannelError, ChannelRouter, ChannelSender, Delivery};
