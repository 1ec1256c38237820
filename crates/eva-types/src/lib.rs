//! `eva-types` – shared vocabulary of the Eva behavior bridge.
//!
//! Everything that crosses a crate boundary lives here: the
//! [`ControlMask`] category bits, the [`OutboundAction`] records published
//! for the animation/TTS backend, the [`InboundEvent`]s consumed from the
//! perception and decision layers, and the workspace-wide [`EvaError`].

pub mod action;
pub mod channel;
pub mod inbound;
pub mod mask;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use action::{OutboundAction, Point3, RosDuration, SaccadeCycle};
pub use channel::Channel;
pub use inbound::{InboundEvent, InboundKind, SaccadeMode};
pub use mask::{Category, ControlMask, PointTargetGating};

/// An [`OutboundAction`] stamped for publication on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "eva-kernel::control_gate"
    pub source: String,
    pub action: OutboundAction,
}

impl OutboundMessage {
    /// Wrap `action` with a fresh id and the current time.
    pub fn new(source: impl Into<String>, action: OutboundAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            action,
        }
    }

    /// The channel this message is published on.
    pub fn channel(&self) -> Channel {
        self.action.channel()
    }
}

/// Global error type for the bridge.
///
/// Only [`EvaError::FatalStartup`] is allowed to terminate the process; every
/// other variant is scoped to the single event that raised it.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvaError {
    #[error("Fatal startup error: {0}")]
    FatalStartup(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown blink trigger: {0}")]
    UnknownTrigger(String),

    #[error("Degraded mode: {0}")]
    DegradedMode(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EvaError {
    /// `true` for errors that must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EvaError::FatalStartup(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roundtrip_keeps_identity() {
        let msg = OutboundMessage::new(
            "eva-kernel::control_gate",
            OutboundAction::FaceIndex { id: 3 },
        );
        let json = serde_json::to_string(&msg).unwrap();
        let back: OutboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.source, msg.source);
        assert_eq!(back.action, msg.action);
    }

    #[test]
    fn message_channel_follows_action() {
        let msg = OutboundMessage::new("test", OutboundAction::TtsStop);
        assert_eq!(msg.channel(), Channel::TtsControl);
    }

    #[test]
    fn eva_error_display() {
        let err = EvaError::UnknownTrigger("sneeze".to_string());
        assert!(err.to_string().contains("sneeze"));

        let err2 = EvaError::Configuration("mask out of range".to_string());
        assert!(err2.to_string().contains("Configuration error"));
    }

    #[test]
    fn only_startup_errors_are_fatal() {
        assert!(EvaError::FatalStartup("no tf".into()).is_fatal());
        assert!(!EvaError::DegradedMode("no client".into()).is_fatal());
        assert!(!EvaError::UnknownTrigger("x".into()).is_fatal());
    }
}
