//! Outbound channels and the ROS topic each one is bound to.

use serde::{Deserialize, Serialize};

/// Every outbound lane the bridge publishes on.
///
/// | Channel | Topic |
/// |---|---|
/// | [`Channel::EmotionState`] | `/blender_api/set_emotion_state` |
/// | [`Channel::Gesture`] | `/blender_api/set_gesture` |
/// | [`Channel::SomaState`] | `/blender_api/set_soma_state` |
/// | [`Channel::Saccade`] | `/blender_api/set_saccade` |
/// | [`Channel::BlinkCycle`] | `/blender_api/set_blink_randomly` |
/// | [`Channel::FaceTarget`] | `/blender_api/set_face_target` |
/// | [`Channel::GazeTarget`] | `/blender_api/set_gaze_target` |
/// | [`Channel::LookAt`] | `/opencog/look_at` |
/// | [`Channel::GazeAt`] | `/opencog/gaze_at` |
/// | [`Channel::GlanceAt`] | `/opencog/glance_at` |
/// | [`Channel::RobotBehavior`] | `robot_behavior` |
/// | [`Channel::ChatbotResponses`] | `chatbot_responses` |
/// | [`Channel::AffectExpress`] | `chatbot_affect_express` |
/// | [`Channel::TtsControl`] | `tts_control` |
/// | [`Channel::ParameterConfig`] | `/opencog_control/set_parameters` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    EmotionState,
    Gesture,
    SomaState,
    Saccade,
    BlinkCycle,
    FaceTarget,
    GazeTarget,
    LookAt,
    GazeAt,
    GlanceAt,
    RobotBehavior,
    ChatbotResponses,
    AffectExpress,
    TtsControl,
    ParameterConfig,
}

impl Channel {
    pub const ALL: [Channel; 15] = [
        Channel::EmotionState,
        Channel::Gesture,
        Channel::SomaState,
        Channel::Saccade,
        Channel::BlinkCycle,
        Channel::FaceTarget,
        Channel::GazeTarget,
        Channel::LookAt,
        Channel::GazeAt,
        Channel::GlanceAt,
        Channel::RobotBehavior,
        Channel::ChatbotResponses,
        Channel::AffectExpress,
        Channel::TtsControl,
        Channel::ParameterConfig,
    ];

    /// The ROS topic name for this channel.
    pub fn topic(self) -> &'static str {
        match self {
            Channel::EmotionState => "/blender_api/set_emotion_state",
            Channel::Gesture => "/blender_api/set_gesture",
            Channel::SomaState => "/blender_api/set_soma_state",
            Channel::Saccade => "/blender_api/set_saccade",
            Channel::BlinkCycle => "/blender_api/set_blink_randomly",
            Channel::FaceTarget => "/blender_api/set_face_target",
            Channel::GazeTarget => "/blender_api/set_gaze_target",
            Channel::LookAt => "/opencog/look_at",
            Channel::GazeAt => "/opencog/gaze_at",
            Channel::GlanceAt => "/opencog/glance_at",
            Channel::RobotBehavior => "robot_behavior",
            Channel::ChatbotResponses => "chatbot_responses",
            Channel::AffectExpress => "chatbot_affect_express",
            Channel::TtsControl => "tts_control",
            Channel::ParameterConfig => "/opencog_control/set_parameters",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn topics_are_unique() {
        let topics: HashSet<_> = Channel::ALL.iter().map(|c| c.topic()).collect();
        assert_eq!(topics.len(), Channel::ALL.len());
    }
}
