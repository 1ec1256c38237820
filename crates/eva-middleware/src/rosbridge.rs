//! rosbridge adapter.
//!
//! [`RosbridgeAdapter`] bridges between the internal [`EventBus`] and a
//! rosbridge-speaking peer:
//!
//! * **Outbound** – every [`OutboundMessage`] becomes one
//!   `{"op":"publish","topic":...,"msg":...}` line on the writer, with the
//!   message body laid out like the corresponding `blender_api_msgs` /
//!   `std_msgs` type.
//!
//! * **Inbound** – a `publish` frame on one of the known inbound topics is
//!   converted into an [`InboundEvent`].  Any other JSON object is parsed as
//!   a tagged [`InboundEvent`] directly, which is how the decision layer
//!   sends commands that have no ROS topic of their own.
//!
//! [`EventBus`]: crate::bus::EventBus

use async_trait::async_trait;
use eva_types::{EvaError, InboundEvent, OutboundAction, OutboundMessage, RosDuration};
use serde_json::{Value, json};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::adapter::BackendAdapter;

/// Maximum byte length of one inbound frame.
///
/// Longer frames are rejected before any parsing happens.
pub const MAX_FRAME_BYTES: usize = 64 * 1024; // 64 KiB

pub const TOPIC_BEHAVIOR_SWITCH: &str = "/behavior_switch";
pub const TOPIC_BEHAVIOR_CONTROL: &str = "/behavior_control";
pub const TOPIC_AFFECT_PERCEIVE: &str = "chatbot_affect_perceive";
pub const TOPIC_CHATBOT_SPEECH: &str = "chatbot_speech";
pub const TOPIC_CHATBOT_BLINK: &str = "chatbot_blink";
pub const TOPIC_AVAILABLE_GESTURES: &str = "/blender_api/available_gestures";
pub const TOPIC_AVAILABLE_EXPRESSIONS: &str = "/blender_api/available_emotion_states";

/// Payload published on `tts_control` to cut the current utterance.
const TTS_STOP_COMMAND: &str = "shutup";

/// Adapter that writes rosbridge frames to `W` and parses inbound frames.
pub struct RosbridgeAdapter<W> {
    writer: Mutex<W>,
}

impl<W> RosbridgeAdapter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Give the writer back, e.g. to inspect what a test wrote.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Render `message` as a rosbridge `publish` frame.
pub fn encode(message: &OutboundMessage) -> Value {
    json!({
        "op": "publish",
        "id": message.id.to_string(),
        "topic": message.channel().topic(),
        "msg": encode_body(&message.action),
    })
}

fn encode_body(action: &OutboundAction) -> Value {
    match action {
        OutboundAction::Expression {
            name,
            magnitude,
            duration_secs,
        } => json!({
            "name": name,
            "magnitude": magnitude,
            "duration": RosDuration::from_secs_f64(*duration_secs),
        }),
        OutboundAction::Gesture {
            name,
            magnitude,
            repeat,
            speed,
        } => json!({
            "name": name,
            "magnitude": magnitude,
            "repeat": repeat,
            "speed": speed,
        }),
        OutboundAction::SomaState {
            name,
            magnitude,
            rate,
            ease_in_secs,
        } => json!({
            "name": name,
            "magnitude": magnitude,
            "rate": rate,
            "ease_in": RosDuration::from_secs_f64(*ease_in_secs),
        }),
        OutboundAction::Saccade(cycle) => json!(cycle),
        OutboundAction::BlinkCycle { mean, variation } => json!({
            "mean": mean,
            "variation": variation,
        }),
        OutboundAction::GazeTarget(p) | OutboundAction::LookTarget(p) => {
            json!({ "x": p.x, "y": p.y, "z": p.z })
        }
        OutboundAction::FaceIndex { id }
        | OutboundAction::GazeAtFace { id }
        | OutboundAction::GlanceAtFace { id } => json!({ "data": id }),
        OutboundAction::AffectExpress(text)
        | OutboundAction::SayText(text)
        | OutboundAction::BehaviorAnnouncement(text) => json!({ "data": text }),
        OutboundAction::TtsStop => json!({ "data": TTS_STOP_COMMAND }),
        // dynamic_reconfigure/Config layout.
        OutboundAction::ParameterBatch(values) => json!({
            "doubles": values
                .iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect::<Vec<_>>(),
        }),
    }
}

/// Parse one inbound frame.
///
/// # Errors
///
/// [`EvaError::Configuration`] when the frame is oversized, not JSON, on an
/// unknown topic, or missing the fields its topic requires.
pub fn decode(frame: &str) -> Result<InboundEvent, EvaError> {
    // ── Input validation ───────────────────────────────────────────────
    if frame.len() > MAX_FRAME_BYTES {
        return Err(EvaError::Configuration(format!(
            "inbound frame is {} bytes, exceeding the limit of {}",
            frame.len(),
            MAX_FRAME_BYTES,
        )));
    }
    let value: Value = serde_json::from_str(frame)
        .map_err(|e| EvaError::Configuration(format!("inbound frame is not JSON: {e}")))?;

    if value.get("op").and_then(Value::as_str) == Some("publish") {
        let topic = value
            .get("topic")
            .and_then(Value::as_str)
            .ok_or_else(|| EvaError::Configuration("publish frame without topic".to_string()))?;
        let msg = value.get("msg").cloned().unwrap_or(Value::Null);
        return decode_topic(topic, &msg);
    }

    serde_json::from_value(value)
        .map_err(|e| EvaError::Configuration(format!("unrecognised inbound event: {e}")))
}

fn decode_topic(topic: &str, msg: &Value) -> Result<InboundEvent, EvaError> {
    match topic {
        TOPIC_BEHAVIOR_SWITCH => Ok(InboundEvent::BehaviorSwitch(string_field(topic, msg, "data")?)),
        TOPIC_BEHAVIOR_CONTROL => msg
            .get("data")
            .and_then(Value::as_i64)
            .map(InboundEvent::BehaviorControl)
            .ok_or_else(|| missing(topic, "data")),
        TOPIC_AFFECT_PERCEIVE => Ok(InboundEvent::AffectPerceived(string_field(topic, msg, "data")?)),
        TOPIC_CHATBOT_SPEECH => Ok(InboundEvent::SpeechHeard {
            utterance: string_field(topic, msg, "utterance")?,
            confidence: msg
                .get("confidence")
                .and_then(Value::as_u64)
                .and_then(|c| u32::try_from(c).ok())
                .unwrap_or(0),
        }),
        TOPIC_CHATBOT_BLINK => Ok(InboundEvent::BlinkRequested(string_field(topic, msg, "data")?)),
        TOPIC_AVAILABLE_GESTURES => Ok(InboundEvent::AvailableGestures(string_list(topic, msg)?)),
        TOPIC_AVAILABLE_EXPRESSIONS => {
            Ok(InboundEvent::AvailableExpressions(string_list(topic, msg)?))
        }
        other => Err(EvaError::Configuration(format!(
            "no inbound route for topic {other}"
        ))),
    }
}

fn string_field(topic: &str, msg: &Value, field: &str) -> Result<String, EvaError> {
    msg.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| missing(topic, field))
}

fn string_list(topic: &str, msg: &Value) -> Result<Vec<String>, EvaError> {
    let items = msg
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| missing(topic, "data"))?;
    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

fn missing(topic: &str, field: &str) -> EvaError {
    EvaError::Configuration(format!("{topic} frame is missing `{field}`"))
}

#[async_trait]
impl<W> BackendAdapter for RosbridgeAdapter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), EvaError> {
        let mut line = encode(message).to_string();
        line.push('\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| EvaError::Channel(format!("rosbridge write failed: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| EvaError::Channel(format!("rosbridge flush failed: {e}")))
    }

    fn decode(&self, frame: &str) -> Result<InboundEvent, EvaError> {
        decode(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eva_types::{Point3, SaccadeMode};
    use std::collections::BTreeMap;

    fn frame(action: OutboundAction) -> Value {
        encode(&OutboundMessage::new("test", action))
    }

    #[test]
    fn expression_duration_is_split() {
        let v = frame(OutboundAction::Expression {
            name: "happy".to_string(),
            magnitude: 0.6,
            duration_secs: 1.5,
        });
        assert_eq!(v["op"], "publish");
        assert_eq!(v["topic"], "/blender_api/set_emotion_state");
        assert_eq!(v["msg"]["name"], "happy");
        assert_eq!(v["msg"]["duration"]["secs"], 1);
        assert_eq!(v["msg"]["duration"]["nsecs"], 500_000_000);
    }

    #[test]
    fn soma_ease_in_is_split() {
        let v = frame(OutboundAction::SomaState {
            name: "normal".to_string(),
            magnitude: 0.1,
            rate: 1.0,
            ease_in_secs: 3.0,
        });
        assert_eq!(v["topic"], "/blender_api/set_soma_state");
        assert_eq!(v["msg"]["ease_in"]["secs"], 3);
    }

    #[test]
    fn look_target_goes_to_face_target_topic() {
        let v = frame(OutboundAction::LookTarget(Point3::new(1.0, 0.5, 0.0)));
        assert_eq!(v["topic"], "/blender_api/set_face_target");
        assert_eq!(v["msg"]["y"], 0.5);
    }

    #[test]
    fn tts_stop_carries_shutup() {
        let v = frame(OutboundAction::TtsStop);
        assert_eq!(v["topic"], "tts_control");
        assert_eq!(v["msg"]["data"], "shutup");
    }

    #[test]
    fn parameter_batch_uses_reconfigure_layout() {
        let mut values = BTreeMap::new();
        values.insert("chat_weight".to_string(), 0.25);
        let v = frame(OutboundAction::ParameterBatch(values));
        assert_eq!(v["topic"], "/opencog_control/set_parameters");
        assert_eq!(v["msg"]["doubles"][0]["name"], "chat_weight");
        assert_eq!(v["msg"]["doubles"][0]["value"], 0.25);
    }

    #[test]
    fn decode_behavior_switch_frame() {
        let ev = decode(r#"{"op":"publish","topic":"/behavior_switch","msg":{"data":"opencog_off"}}"#)
            .unwrap();
        assert_eq!(ev, InboundEvent::BehaviorSwitch("opencog_off".to_string()));
    }

    #[test]
    fn decode_behavior_control_frame() {
        let ev = decode(r#"{"op":"publish","topic":"/behavior_control","msg":{"data":13}}"#).unwrap();
        assert_eq!(ev, InboundEvent::BehaviorControl(13));
    }

    #[test]
    fn decode_chat_message() {
        let ev = decode(
            r#"{"op":"publish","topic":"chatbot_speech","msg":{"utterance":"shut up","confidence":90}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            InboundEvent::SpeechHeard {
                utterance: "shut up".to_string(),
                confidence: 90
            }
        );
    }

    #[test]
    fn decode_available_gestures() {
        let ev = decode(
            r#"{"op":"publish","topic":"/blender_api/available_gestures","msg":{"data":["blink","nod-1"]}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            InboundEvent::AvailableGestures(vec!["blink".to_string(), "nod-1".to_string()])
        );
    }

    #[test]
    fn decode_falls_back_to_tagged_event() {
        let ev = decode(r#"{"event":"saccade","data":"listening"}"#).unwrap();
        assert_eq!(ev, InboundEvent::Saccade(SaccadeMode::Listening));
    }

    #[test]
    fn decode_rejects_bad_frames() {
        assert!(matches!(decode("not json"), Err(EvaError::Configuration(_))));
        assert!(decode(r#"{"op":"publish","topic":"/unknown","msg":{}}"#).is_err());
        assert!(decode(r#"{"op":"publish","topic":"/behavior_control","msg":{"data":"x"}}"#).is_err());
        let oversized = format!(r#"{{"event":"say","data":"{}"}}"#, "x".repeat(MAX_FRAME_BYTES));
        assert!(decode(&oversized).is_err());
    }

    #[tokio::test]
    async fn deliver_writes_one_line_per_message() {
        let adapter = RosbridgeAdapter::new(Vec::<u8>::new());
        adapter
            .deliver(&OutboundMessage::new("test", OutboundAction::FaceIndex { id: 0 }))
            .await
            .unwrap();
        adapter
            .deliver(&OutboundMessage::new("test", OutboundAction::SayText("hi".into())))
            .await
            .unwrap();

        let written = String::from_utf8(adapter.into_inner()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["topic"], "/opencog/look_at");
        assert_eq!(first["msg"]["data"], 0);
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["topic"], "chatbot_responses");
    }
}
