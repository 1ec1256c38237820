//! The backend adapter seam.
//!
//! The bridge never speaks directly to ROS.  It publishes to its internal
//! [`EventBus`][crate::bus::EventBus]; adapters listen on the bus tap and
//! translate messages into the wire protocol of the outside world, and turn
//! inbound wire frames into [`InboundEvent`]s.
//!
//! - [`BackendAdapter`] – the trait every adapter must implement.
//! - [`RosbridgeAdapter`][crate::rosbridge::RosbridgeAdapter] – newline
//!   delimited rosbridge JSON frames.

use async_trait::async_trait;
use eva_types::{EvaError, InboundEvent, OutboundMessage};

/// Every external-protocol adapter must implement this trait.
///
/// # Contract
///
/// * `deliver` – writes one [`OutboundMessage`] to the backend.  Errors are
///   reported to the caller, which logs them and keeps going.
///
/// * `decode` – turns one raw inbound frame into an [`InboundEvent`], or a
///   [`EvaError::Configuration`] when the frame is malformed.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), EvaError>;

    fn decode(&self, frame: &str) -> Result<InboundEvent, EvaError>;
}
