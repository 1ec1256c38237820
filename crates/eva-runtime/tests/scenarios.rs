//! End-to-end behavior scenarios: inbound events in, bus traffic out.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eva_kernel::{ConfigClient, ControlGate, ParameterMirror, PSI_PREFIX};
use eva_middleware::{EventBus, RosbridgeAdapter};
use eva_perception::{CoordinateTransform, Quaternion, TfEngine, Transform3D, TransformListener, Vec3};
use eva_runtime::{
    BehaviorContext, BridgeSettings, EventLoop, Router, bootstrap, pump_outbound,
};
use eva_types::{Channel, EvaError, InboundEvent, OutboundAction, Point3};
use tokio::sync::mpsc;

fn context(bus: &EventBus) -> BehaviorContext {
    BehaviorContext::new(
        ControlGate::new(bus.clone()),
        ParameterMirror::new(PSI_PREFIX),
        CoordinateTransform::identity("blender"),
    )
}

#[test]
fn chat_heard_blinks_about_forty_percent_of_the_time() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe_to(Channel::Gesture);
    let mut ctx = context(&bus).with_seed(0x5eed);
    let router = Router::standard();

    let mut blinks = 0;
    for _ in 0..10_000 {
        router
            .dispatch(&mut ctx, InboundEvent::BlinkRequested("chat_heard".into()))
            .unwrap();
        blinks += rx.drain().len();
    }
    assert!((3800..=4200).contains(&blinks), "got {blinks} blinks");
}

#[test]
fn unknown_trigger_is_rejected_without_output() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe_to(Channel::Gesture);
    let mut ctx = context(&bus);
    let result = Router::standard().dispatch(&mut ctx, InboundEvent::BlinkRequested("yawn".into()));
    assert!(matches!(result, Err(EvaError::UnknownTrigger(t)) if t == "yawn"));
    assert!(rx.drain().is_empty());
}

#[test]
fn shut_up_stops_speech_exactly_once() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe_to(Channel::TtsControl);
    let mut ctx = context(&bus);
    let router = Router::standard();

    for utterance in ["Please shut UP now", "keep talking"] {
        router
            .dispatch(
                &mut ctx,
                InboundEvent::SpeechHeard {
                    utterance: utterance.into(),
                    confidence: 100,
                },
            )
            .unwrap();
    }

    let seen = rx.drain();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].action, OutboundAction::TtsStop);
}

#[test]
fn wave_is_published_until_gestures_are_masked() {
    let bus = EventBus::default();
    let mut rx = bus.subscribe_to(Channel::Gesture);
    let mut ctx = context(&bus);
    let router = Router::standard();
    let wave = OutboundAction::Gesture {
        name: "wave".into(),
        magnitude: 0.5,
        repeat: 1,
        speed: 1.0,
    };

    router.dispatch(&mut ctx, InboundEvent::Perform(wave.clone())).unwrap();
    let seen = rx.drain();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].action, wave);
    assert_eq!(seen[0].channel().topic(), "/blender_api/set_gesture");

    router
        .dispatch(&mut ctx, InboundEvent::BehaviorControl(255 & !2))
        .unwrap();
    router.dispatch(&mut ctx, InboundEvent::Perform(wave)).unwrap();
    assert!(rx.drain().is_empty());
}

#[derive(Clone, Default)]
struct RecordingClient(Arc<Mutex<Vec<BTreeMap<String, f64>>>>);

impl ConfigClient for RecordingClient {
    fn update_configuration(&mut self, values: &BTreeMap<String, f64>) -> Result<(), EvaError> {
        self.0.lock().unwrap().push(values.clone());
        Ok(())
    }
}

#[test]
fn repeated_parameter_value_is_pushed_once() {
    let bus = EventBus::default();
    let client = RecordingClient::default();
    let mut mirror = ParameterMirror::new(PSI_PREFIX).with_client(Box::new(client.clone()));
    mirror.register("chat-weight", 0.5);
    let mut ctx = BehaviorContext::new(
        ControlGate::new(bus),
        mirror,
        CoordinateTransform::identity("blender"),
    );
    let router = Router::standard();
    let update = || InboundEvent::ParameterUpdate {
        name: "OpenPsi: chat-weight".into(),
        value: 0.75,
    };

    router.dispatch(&mut ctx, update()).unwrap();
    router.dispatch(&mut ctx, InboundEvent::PushParameters).unwrap();
    router.dispatch(&mut ctx, update()).unwrap();
    router.dispatch(&mut ctx, InboundEvent::PushParameters).unwrap();

    let batches = client.0.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0]["chat-weight"], 0.75);
}

#[test]
fn switching_off_recenters_even_with_eyes_masked() {
    let bus = EventBus::default();
    let mut look = bus.subscribe_to(Channel::LookAt);
    let mut ctx = context(&bus);
    let router = Router::standard();

    router
        .dispatch(&mut ctx, InboundEvent::BehaviorControl(255 & !16))
        .unwrap();
    router
        .dispatch(&mut ctx, InboundEvent::Perform(OutboundAction::FaceIndex { id: 4 }))
        .unwrap();
    assert!(look.drain().is_empty(), "face look-at honours the eyes bit");

    router
        .dispatch(&mut ctx, InboundEvent::BehaviorSwitch("opencog_off".into()))
        .unwrap();
    let seen = look.drain();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].action, OutboundAction::FaceIndex { id: 0 });
}

#[tokio::test]
async fn rosbridge_frames_flow_from_stdin_shape_to_stdout_shape() {
    let mut tf = TfEngine::new();
    tf.set_transform(
        "blender",
        "camera",
        Transform3D::new(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity()),
    );
    let settings = BridgeSettings {
        config_client_timeout: Duration::from_millis(10),
        rng_seed: Some(3),
        ..BridgeSettings::default()
    };
    let bus = EventBus::default();
    let tap = bus.subscribe_all();
    let ctx = bootstrap(&settings, bus, &TransformListener::new(tf)).unwrap();

    let adapter = RosbridgeAdapter::new(Vec::<u8>::new());
    let (tx, inbound) = mpsc::channel(8);
    for frame in [
        r#"{"op":"publish","topic":"chatbot_affect_perceive","msg":{"data":"happy"}}"#,
        r#"{"event":"gaze_at_point","data":{"x":1.0,"y":0.0,"z":0.0}}"#,
    ] {
        tx.send(eva_middleware::rosbridge::decode(frame).unwrap())
            .await
            .unwrap();
    }
    drop(tx);

    let ctx = EventLoop::new(Router::standard(), Duration::from_secs(60))
        .run(ctx, inbound)
        .await;
    // Dropping the context drops the last bus handle and closes the tap.
    drop(ctx);
    let delivered = pump_outbound(tap, &adapter).await;
    assert_eq!(delivered, 2);

    let written = String::from_utf8(adapter.into_inner()).unwrap();
    let frames: Vec<serde_json::Value> = written
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(frames[0]["topic"], "chatbot_affect_express");
    assert_eq!(frames[1]["topic"], "/blender_api/set_gaze_target");
    let target: Point3 = serde_json::from_value(frames[1]["msg"].clone()).unwrap();
    assert!((target.x - 1.5).abs() < 1e-12);
}
