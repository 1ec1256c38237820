//! `eva-middleware` – The Nervous System
//!
//! Routes outbound actions between the control gate and the animation
//! backend without caring about what they mean.
//!
//! # Modules
//!
//! - [`bus`] – Headless, channel-partitioned publish/subscribe bus built on
//!   Tokio broadcast channels.
//! - [`adapter`] – the [`BackendAdapter`] trait every wire protocol
//!   implements.
//! - [`rosbridge`] – newline-delimited rosbridge JSON frames in and out.

pub mod adapter;
pub mod bus;
pub mod rosbridge;

pub use adapter::BackendAdapter;
pub use bus::{ChannelReceiver, EventBus, TapReceiver};
pub use rosbridge::RosbridgeAdapter;
