//! Events consumed from the perception and decision layers.

use serde::{Deserialize, Serialize};

use crate::{OutboundAction, Point3};

/// Which saccade preset to switch the eyes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaccadeMode {
    Explore,
    Conversational,
    Listening,
}

/// An inbound event, as delivered to the router.
///
/// The JSON form is adjacently tagged:
///
/// ```
/// use eva_types::InboundEvent;
///
/// let ev: InboundEvent =
///     serde_json::from_str(r#"{"event":"blink_requested","data":"chat_heard"}"#).unwrap();
/// assert_eq!(ev, InboundEvent::BlinkRequested("chat_heard".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    /// `opencog_on` / `opencog_off`; anything else is ignored.
    BehaviorSwitch(String),
    /// Raw `/behavior_control` integer.
    BehaviorControl(i64),
    /// Sentiment of what was said to the robot.
    AffectPerceived(String),
    /// What the speech recogniser heard.
    SpeechHeard {
        utterance: String,
        #[serde(default)]
        confidence: u32,
    },
    /// The chatbot asks for a blink; the payload names the trigger source.
    BlinkRequested(String),
    /// Move the eyes to a point in the sensor frame.
    GazeAtPoint(Point3),
    /// Turn the head to a point in the sensor frame.
    LookAtPoint(Point3),
    ParameterUpdate {
        name: String,
        value: f64,
    },
    /// Periodic tick: flush the parameter mirror if it is dirty.
    PushParameters,
    /// Decision-layer command: publish this action through the gate.
    Perform(OutboundAction),
    Saccade(SaccadeMode),
    BlinkRate {
        mean: f64,
        variation: f64,
    },
    GoToSleep,
    WakeUp,
    AvailableGestures(Vec<String>),
    AvailableExpressions(Vec<String>),
}

/// Discriminant of [`InboundEvent`], used as the routing-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    BehaviorSwitch,
    BehaviorControl,
    AffectPerceived,
    SpeechHeard,
    BlinkRequested,
    GazeAtPoint,
    LookAtPoint,
    ParameterUpdate,
    PushParameters,
    Perform,
    Saccade,
    BlinkRate,
    GoToSleep,
    WakeUp,
    AvailableGestures,
    AvailableExpressions,
}

impl InboundKind {
    pub const ALL: [InboundKind; 16] = [
        InboundKind::BehaviorSwitch,
        InboundKind::BehaviorControl,
        InboundKind::AffectPerceived,
        InboundKind::SpeechHeard,
        InboundKind::BlinkRequested,
        InboundKind::GazeAtPoint,
        InboundKind::LookAtPoint,
        InboundKind::ParameterUpdate,
        InboundKind::PushParameters,
        InboundKind::Perform,
        InboundKind::Saccade,
        InboundKind::BlinkRate,
        InboundKind::GoToSleep,
        InboundKind::WakeUp,
        InboundKind::AvailableGestures,
        InboundKind::AvailableExpressions,
    ];
}

impl InboundEvent {
    pub fn kind(&self) -> InboundKind {
        match self {
            InboundEvent::BehaviorSwitch(_) => InboundKind::BehaviorSwitch,
            InboundEvent::BehaviorControl(_) => InboundKind::BehaviorControl,
            InboundEvent::AffectPerceived(_) => InboundKind::AffectPerceived,
            InboundEvent::SpeechHeard { .. } => InboundKind::SpeechHeard,
            InboundEvent::BlinkRequested(_) => InboundKind::BlinkRequested,
            InboundEvent::GazeAtPoint(_) => InboundKind::GazeAtPoint,
            InboundEvent::LookAtPoint(_) => InboundKind::LookAtPoint,
            InboundEvent::ParameterUpdate { .. } => InboundKind::ParameterUpdate,
            InboundEvent::PushParameters => InboundKind::PushParameters,
            InboundEvent::Perform(_) => InboundKind::Perform,
            InboundEvent::Saccade(_) => InboundKind::Saccade,
            InboundEvent::BlinkRate { .. } => InboundKind::BlinkRate,
            InboundEvent::GoToSleep => InboundKind::GoToSleep,
            InboundEvent::WakeUp => InboundKind::WakeUp,
            InboundEvent::AvailableGestures(_) => InboundKind::AvailableGestures,
            InboundEvent::AvailableExpressions(_) => InboundKind::AvailableExpressions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_variant_parses_without_data() {
        let ev: InboundEvent = serde_json::from_str(r#"{"event":"push_parameters"}"#).unwrap();
        assert_eq!(ev.kind(), InboundKind::PushParameters);
    }

    #[test]
    fn speech_confidence_defaults_to_zero() {
        let ev: InboundEvent =
            serde_json::from_str(r#"{"event":"speech_heard","data":{"utterance":"hi"}}"#).unwrap();
        assert_eq!(
            ev,
            InboundEvent::SpeechHeard {
                utterance: "hi".to_string(),
                confidence: 0
            }
        );
    }

    #[test]
    fn perform_wraps_an_action() {
        let raw = r#"{"event":"perform","data":{"action":"say_text","payload":"hello"}}"#;
        let ev: InboundEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(ev, InboundEvent::Perform(OutboundAction::SayText("hello".into())));
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_str::<InboundEvent>(r#"{"event":"dance"}"#).is_err());
    }
}
