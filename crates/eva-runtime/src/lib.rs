//! `eva-runtime` – event routing for the Eva behavior bridge.
//!
//! Owns the one task that turns inbound events into outbound actions.
//!
//! # Modules
//!
//! - [`context`] – [`BehaviorContext`]: the gate, the parameter mirror, the
//!   cached coordinate transform, the blink table and the random source,
//!   bundled into one explicitly owned value.
//! - [`router`] – [`Router`]: table from
//!   [`InboundKind`][eva_types::InboundKind] to handler function.
//! - [`event_loop`] – [`EventLoop`]: serialises inbound events and the
//!   parameter-push tick in one `select!` loop; [`pump_outbound`] feeds the
//!   bus to a [`BackendAdapter`][eva_middleware::BackendAdapter].
//! - [`bootstrap`] – [`bootstrap()`]: bounded transform wait and
//!   configuration-client probe, the only fatal boundary.
//! - [`telemetry`] – [`init_tracing`]: global `tracing` subscriber with an
//!   optional OTLP span exporter.

pub mod bootstrap;
pub mod context;
pub mod event_loop;
pub mod router;
pub mod telemetry;

pub use bootstrap::{BridgeSettings, assemble, bootstrap};
pub use context::{BehaviorContext, BlinkTable};
pub use event_loop::{DEFAULT_PUSH_INTERVAL, EventLoop, pump_outbound};
pub use router::{Handler, Router, SHUT_UP};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
