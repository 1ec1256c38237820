//! Outbound action records.
//!
//! Each [`OutboundAction`] variant maps to exactly one [`Channel`].  Actions
//! are built, gated, published and dropped; nothing keeps a reference to
//! them afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Category, Channel, EvaError};

/// Name that every named action treats as "do nothing".
pub const NOOP: &str = "noop";

/// A point in metres.  Which frame it is expressed in depends on context.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// ROS `duration` split into whole seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosDuration {
    pub secs: i32,
    pub nsecs: i32,
}

impl RosDuration {
    /// Longest duration the wire format can carry.
    pub const MAX_SECS: f64 = i32::MAX as f64;

    pub fn from_secs_f64(secs: f64) -> Self {
        let whole = secs.trunc();
        let nsecs = ((secs - whole) * 1e9).round().clamp(0.0, 999_999_999.0);
        Self {
            secs: whole as i32,
            nsecs: nsecs as i32,
        }
    }
}

/// Parameters of the eye saccade generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaccadeCycle {
    pub mean: f64,
    pub variation: f64,
    pub paint_scale: f64,
    pub eye_size: f64,
    pub eye_distance: f64,
    pub mouth_width: f64,
    pub mouth_height: f64,
    pub weight_eyes: f64,
    pub weight_mouth: f64,
}

impl SaccadeCycle {
    /// Wide, slow saccades used while nobody is being talked to.
    pub fn explore() -> Self {
        Self {
            mean: 0.8,
            variation: 0.3,
            paint_scale: 0.3,
            eye_size: 15.0,
            eye_distance: 100.0,
            mouth_width: 90.0,
            mouth_height: 27.0,
            weight_eyes: 0.8,
            weight_mouth: 0.2,
        }
    }

    /// Micro-saccades that study the face of the current speaker.
    pub fn conversational() -> Self {
        Self {
            mean: 0.8,
            variation: 0.5,
            paint_scale: 0.3,
            eye_size: 11.5,
            eye_distance: 100.0,
            mouth_width: 90.0,
            mouth_height: 5.0,
            weight_eyes: 0.8,
            weight_mouth: 0.2,
        }
    }

    pub fn listening() -> Self {
        Self {
            mean: 1.0,
            variation: 0.6,
            paint_scale: 0.3,
            eye_size: 11.0,
            eye_distance: 80.0,
            mouth_width: 50.0,
            mouth_height: 13.0,
            weight_eyes: 0.8,
            weight_mouth: 0.2,
        }
    }

    fn values(&self) -> [f64; 9] {
        [
            self.mean,
            self.variation,
            self.paint_scale,
            self.eye_size,
            self.eye_distance,
            self.mouth_width,
            self.mouth_height,
            self.weight_eyes,
            self.weight_mouth,
        ]
    }
}

/// Everything the bridge can publish for the animation and speech backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum OutboundAction {
    /// Facial expression held for `duration_secs`.
    Expression {
        name: String,
        magnitude: f64,
        duration_secs: f64,
    },
    Gesture {
        name: String,
        magnitude: f64,
        repeat: u32,
        speed: f64,
    },
    /// Whole-body state (breathing, sleepiness...).
    SomaState {
        name: String,
        magnitude: f64,
        rate: f64,
        ease_in_secs: f64,
    },
    Saccade(SaccadeCycle),
    BlinkCycle { mean: f64, variation: f64 },
    /// Eyes-only target, in the animation frame.
    GazeTarget(Point3),
    /// Whole-head target, in the animation frame.
    LookTarget(Point3),
    /// Turn towards the face with this id (0 recenters).
    FaceIndex { id: i32 },
    GazeAtFace { id: i32 },
    GlanceAtFace { id: i32 },
    AffectExpress(String),
    TtsStop,
    SayText(String),
    BehaviorAnnouncement(String),
    ParameterBatch(BTreeMap<String, f64>),
}

impl OutboundAction {
    /// The standard blink emitted when a chatbot blink request wins its draw.
    pub fn blink() -> Self {
        OutboundAction::Gesture {
            name: "blink".to_string(),
            magnitude: 1.0,
            repeat: 1,
            speed: 1.0,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            OutboundAction::Expression { .. } => Channel::EmotionState,
            OutboundAction::Gesture { .. } => Channel::Gesture,
            OutboundAction::SomaState { .. } => Channel::SomaState,
            OutboundAction::Saccade(_) => Channel::Saccade,
            OutboundAction::BlinkCycle { .. } => Channel::BlinkCycle,
            OutboundAction::GazeTarget(_) => Channel::GazeTarget,
            OutboundAction::LookTarget(_) => Channel::FaceTarget,
            OutboundAction::FaceIndex { .. } => Channel::LookAt,
            OutboundAction::GazeAtFace { .. } => Channel::GazeAt,
            OutboundAction::GlanceAtFace { .. } => Channel::GlanceAt,
            OutboundAction::AffectExpress(_) => Channel::AffectExpress,
            OutboundAction::TtsStop => Channel::TtsControl,
            OutboundAction::SayText(_) => Channel::ChatbotResponses,
            OutboundAction::BehaviorAnnouncement(_) => Channel::RobotBehavior,
            OutboundAction::ParameterBatch(_) => Channel::ParameterConfig,
        }
    }

    /// The mask category gating this action, or `None` if it is never gated.
    ///
    /// Point targets report [`Category::Eyes`]; whether that bit is actually
    /// consulted for them is a gate policy decision.
    pub fn category(&self) -> Option<Category> {
        match self {
            OutboundAction::Expression { .. } => Some(Category::Expression),
            OutboundAction::Gesture { .. } => Some(Category::Gesture),
            OutboundAction::SomaState { .. } => Some(Category::Soma),
            OutboundAction::Saccade(_) => Some(Category::Saccade),
            OutboundAction::FaceIndex { .. }
            | OutboundAction::GazeTarget(_)
            | OutboundAction::LookTarget(_) => Some(Category::Eyes),
            _ => None,
        }
    }

    pub fn is_point_target(&self) -> bool {
        matches!(
            self,
            OutboundAction::GazeTarget(_) | OutboundAction::LookTarget(_)
        )
    }

    /// Animation name for the named variants.
    pub fn name(&self) -> Option<&str> {
        match self {
            OutboundAction::Expression { name, .. }
            | OutboundAction::Gesture { name, .. }
            | OutboundAction::SomaState { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.name() == Some(NOOP)
    }

    /// Reject payloads that the backend cannot interpret.
    ///
    /// # Errors
    ///
    /// [`EvaError::Configuration`] naming the offending field.
    pub fn validate(&self) -> Result<(), EvaError> {
        if let Some(name) = self.name() {
            if name.trim().is_empty() {
                return Err(malformed(self, "name is empty"));
            }
        }
        match self {
            OutboundAction::Expression {
                magnitude,
                duration_secs,
                ..
            } => {
                if !(0.0..=1.0).contains(magnitude) {
                    return Err(malformed(self, "magnitude must be within 0.0..=1.0"));
                }
                duration(self, "duration_secs", *duration_secs)
            }
            OutboundAction::Gesture {
                magnitude, speed, ..
            } => {
                finite(self, "magnitude", *magnitude)?;
                finite(self, "speed", *speed)
            }
            OutboundAction::SomaState {
                magnitude,
                rate,
                ease_in_secs,
                ..
            } => {
                finite(self, "magnitude", *magnitude)?;
                finite(self, "rate", *rate)?;
                duration(self, "ease_in_secs", *ease_in_secs)
            }
            OutboundAction::Saccade(cycle) => {
                if cycle.values().iter().all(|v| v.is_finite()) {
                    Ok(())
                } else {
                    Err(malformed(self, "saccade parameters must be finite"))
                }
            }
            OutboundAction::BlinkCycle { mean, variation } => {
                non_negative(self, "mean", *mean)?;
                non_negative(self, "variation", *variation)
            }
            OutboundAction::GazeTarget(p) | OutboundAction::LookTarget(p) => {
                if p.is_finite() {
                    Ok(())
                } else {
                    Err(malformed(self, "target point must be finite"))
                }
            }
            OutboundAction::ParameterBatch(values) => {
                match values.iter().find(|(_, v)| !v.is_finite()) {
                    Some((name, _)) => Err(malformed(self, &format!("parameter {name} is not finite"))),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

fn malformed(action: &OutboundAction, reason: &str) -> EvaError {
    EvaError::Configuration(format!("malformed {:?} action: {reason}", action.channel()))
}

fn finite(action: &OutboundAction, field: &str, value: f64) -> Result<(), EvaError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(malformed(action, &format!("{field} is not finite")))
    }
}

fn non_negative(action: &OutboundAction, field: &str, value: f64) -> Result<(), EvaError> {
    finite(action, field, value)?;
    if value < 0.0 {
        return Err(malformed(action, &format!("{field} is negative")));
    }
    Ok(())
}

fn duration(action: &OutboundAction, field: &str, value: f64) -> Result<(), EvaError> {
    non_negative(action, field, value)?;
    if value > RosDuration::MAX_SECS {
        return Err(malformed(action, &format!("{field} exceeds {} s", RosDuration::MAX_SECS)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave() -> OutboundAction {
        OutboundAction::Gesture {
            name: "wave".to_string(),
            magnitude: 0.5,
            repeat: 1,
            speed: 1.0,
        }
    }

    #[test]
    fn every_variant_has_a_channel_and_gated_ones_a_category() {
        assert_eq!(wave().channel(), Channel::Gesture);
        assert_eq!(wave().category(), Some(Category::Gesture));
        assert_eq!(OutboundAction::TtsStop.category(), None);
        assert_eq!(
            OutboundAction::FaceIndex { id: 0 }.category(),
            Some(Category::Eyes)
        );
        assert_eq!(OutboundAction::GlanceAtFace { id: 2 }.category(), None);
    }

    #[test]
    fn noop_is_detected_by_name() {
        let noop = OutboundAction::Expression {
            name: NOOP.to_string(),
            magnitude: 0.5,
            duration_secs: 1.0,
        };
        assert!(noop.is_noop());
        assert!(!wave().is_noop());
        assert!(!OutboundAction::TtsStop.is_noop());
    }

    #[test]
    fn ros_duration_splits_fraction() {
        let d = RosDuration::from_secs_f64(2.25);
        assert_eq!(d.secs, 2);
        assert_eq!(d.nsecs, 250_000_000);

        let d = RosDuration::from_secs_f64(3.0);
        assert_eq!(d, RosDuration { secs: 3, nsecs: 0 });
    }

    #[test]
    fn validate_accepts_well_formed_actions() {
        assert!(wave().validate().is_ok());
        assert!(OutboundAction::Saccade(SaccadeCycle::listening()).validate().is_ok());
        assert!(OutboundAction::GazeTarget(Point3::new(1.0, 0.0, 0.2)).validate().is_ok());
    }

    #[test]
    fn validate_rejects_malformed_payloads() {
        let empty_name = OutboundAction::Gesture {
            name: "  ".to_string(),
            magnitude: 1.0,
            repeat: 1,
            speed: 1.0,
        };
        assert!(matches!(empty_name.validate(), Err(EvaError::Configuration(_))));

        let loud = OutboundAction::Expression {
            name: "happy".to_string(),
            magnitude: 1.5,
            duration_secs: 1.0,
        };
        assert!(loud.validate().is_err());

        let backwards = OutboundAction::SomaState {
            name: "normal".to_string(),
            magnitude: 0.1,
            rate: 1.0,
            ease_in_secs: -3.0,
        };
        assert!(backwards.validate().is_err());

        let endless = OutboundAction::Expression {
            name: "happy".to_string(),
            magnitude: 0.5,
            duration_secs: 1e10,
        };
        assert!(matches!(endless.validate(), Err(EvaError::Configuration(_))));

        let slow_ease = OutboundAction::SomaState {
            name: "normal".to_string(),
            magnitude: 0.1,
            rate: 1.0,
            ease_in_secs: RosDuration::MAX_SECS + 1.0,
        };
        assert!(slow_ease.validate().is_err());

        let longest = OutboundAction::Expression {
            name: "happy".to_string(),
            magnitude: 0.5,
            duration_secs: RosDuration::MAX_SECS,
        };
        assert!(longest.validate().is_ok());

        let nan_target = OutboundAction::LookTarget(Point3::new(f64::NAN, 0.0, 0.0));
        assert!(nan_target.validate().is_err());
    }

    #[test]
    fn action_json_is_tagged() {
        let json = serde_json::to_value(wave()).unwrap();
        assert_eq!(json["action"], "gesture");
        assert_eq!(json["payload"]["name"], "wave");
    }
}
