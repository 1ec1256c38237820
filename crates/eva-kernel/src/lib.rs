//! `eva-kernel` – Gating & State
//!
//! The brainstem of the bridge. It does not decide anything; it enforces
//! which outbound actions may leave and keeps the little state the bridge
//! owns.
//!
//! # Modules
//!
//! - [`control_gate`] – [`ControlGate`][control_gate::ControlGate]: the
//!   single interception point every outbound action passes through.  Holds
//!   the [`ControlMask`][eva_types::ControlMask] and the running flag.
//! - [`parameter_mirror`] – [`ParameterMirror`][parameter_mirror::ParameterMirror]:
//!   caches rule-weight parameters and pushes changed batches downstream
//!   through a [`ConfigClient`][parameter_mirror::ConfigClient].

pub mod control_gate;
pub mod parameter_mirror;

pub use control_gate::{ControlGate, SWITCH_OFF, SWITCH_ON};
pub use parameter_mirror::{BusConfigClient, ConfigClient, ParameterMirror, PushOutcome, PSI_PREFIX};
