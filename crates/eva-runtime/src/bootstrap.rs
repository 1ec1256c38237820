//! Startup: the only phase allowed to fail fatally.
//!
//! [`bootstrap`] waits (bounded) for the camera → animation transform,
//! caches it, and tries to reach a configuration client.  A missing
//! transform is [`EvaError::FatalStartup`]; a missing client only degrades
//! parameter pushes.

use std::collections::BTreeMap;
use std::time::Duration;

use eva_kernel::{BusConfigClient, ControlGate, ParameterMirror, PSI_PREFIX};
use eva_middleware::EventBus;
use eva_perception::{CoordinateTransform, TransformListener};
use eva_types::{EvaError, PointTargetGating};
use tracing::{info, warn};

use crate::context::{BehaviorContext, BlinkTable};

/// Everything [`bootstrap`] needs to assemble a [`BehaviorContext`].
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Frame the animation backend works in.
    pub location_frame: String,
    /// Frame perception reports points in.
    pub camera_frame: String,
    pub transform_timeout: Duration,
    pub point_target_gating: PointTargetGating,
    pub blink_table: BlinkTable,
    pub parameter_prefix: String,
    /// Parameters mirrored from the start, with their initial values.
    pub parameters: BTreeMap<String, f64>,
    pub config_client_timeout: Duration,
    /// Fixed seed for the blink draw; entropy when `None`.
    pub rng_seed: Option<u64>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            location_frame: "blender".to_string(),
            camera_frame: "camera".to_string(),
            transform_timeout: Duration::from_secs(10),
            point_target_gating: PointTargetGating::default(),
            blink_table: BlinkTable::default(),
            parameter_prefix: PSI_PREFIX.to_string(),
            parameters: BTreeMap::new(),
            config_client_timeout: Duration::from_secs(2),
            rng_seed: None,
        }
    }
}

/// Wait for the transform, then build the context.
///
/// Blocks for at most `transform_timeout + config_client_timeout`.
///
/// # Errors
///
/// [`EvaError::FatalStartup`] when the transform is not available in time.
pub fn bootstrap(
    settings: &BridgeSettings,
    bus: EventBus,
    transforms: &TransformListener,
) -> Result<BehaviorContext, EvaError> {
    let raw = transforms.wait_for_transform(
        &settings.location_frame,
        &settings.camera_frame,
        settings.transform_timeout,
    )?;
    let transform =
        CoordinateTransform::from_transform(&settings.camera_frame, &settings.location_frame, raw)?;
    info!(
        source = transform.source_frame(),
        target = transform.target_frame(),
        "coordinate transform cached"
    );
    Ok(assemble(settings, bus, transform))
}

/// Build the context around an already-computed transform.
///
/// Any receiver of the parameter channel counts as the configuration
/// client, the all-channel tap included.  A bridge whose outbound writer is
/// subscribed before this call therefore always connects; the mirror only
/// degrades when nothing at all consumes parameter batches.
pub fn assemble(
    settings: &BridgeSettings,
    bus: EventBus,
    transform: CoordinateTransform,
) -> BehaviorContext {
    let mut mirror = ParameterMirror::new(settings.parameter_prefix.clone());
    for (name, value) in &settings.parameters {
        mirror.register(name.clone(), *value);
    }
    let mirror = match BusConfigClient::connect(bus.clone(), settings.config_client_timeout) {
        Ok(client) => mirror.with_client(Box::new(client)),
        Err(e) => {
            warn!(error = %e, "configuration client unavailable; parameter pushes disabled");
            mirror.degraded(&e)
        }
    };

    let gate = ControlGate::new(bus).with_point_target_gating(settings.point_target_gating);
    let ctx = BehaviorContext::new(gate, mirror, transform)
        .with_blink_table(settings.blink_table.clone());
    match settings.rng_seed {
        Some(seed) => ctx.with_seed(seed),
        None => ctx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eva_perception::{Quaternion, TfEngine, Transform3D, Vec3};
    use eva_types::{Channel, Point3};

    fn quick() -> BridgeSettings {
        BridgeSettings {
            transform_timeout: Duration::from_millis(20),
            config_client_timeout: Duration::from_millis(20),
            ..BridgeSettings::default()
        }
    }

    #[test]
    fn missing_transform_is_fatal() {
        let result = bootstrap(&quick(), EventBus::default(), &TransformListener::default());
        match result {
            Err(e) => assert!(e.is_fatal(), "unexpected error {e:?}"),
            Ok(_) => panic!("bootstrap succeeded without a transform"),
        }
    }

    #[test]
    fn cached_transform_maps_camera_into_blender() {
        let mut tf = TfEngine::new();
        tf.set_transform(
            "blender",
            "camera",
            Transform3D::new(Vec3::new(0.0, 0.0, 1.2), Quaternion::identity()),
        );
        let ctx = bootstrap(&quick(), EventBus::default(), &TransformListener::new(tf)).unwrap();
        let p = ctx.transform.to_target(Point3::new(1.0, 0.0, 0.0));
        assert!((p.z - 1.2).abs() < 1e-12);
    }

    #[test]
    fn no_listener_means_degraded_mirror() {
        let ctx = assemble(
            &quick(),
            EventBus::default(),
            CoordinateTransform::identity("blender"),
        );
        assert!(!ctx.mirror.has_client());
    }

    #[test]
    fn outbound_tap_counts_as_the_configuration_client() {
        let bus = EventBus::default();
        let _writer = bus.subscribe_all();
        let ctx = assemble(&quick(), bus, CoordinateTransform::identity("blender"));
        assert!(ctx.mirror.has_client());
    }

    #[test]
    fn listener_on_the_bus_connects_the_mirror() {
        let bus = EventBus::default();
        let _rx = bus.subscribe_to(Channel::ParameterConfig);
        let mut settings = quick();
        settings.parameters.insert("chat-weight".to_string(), 0.5);
        settings.point_target_gating = PointTargetGating::Eyes;

        let ctx = assemble(&settings, bus, CoordinateTransform::identity("blender"));
        assert!(ctx.mirror.has_client());
        assert_eq!(ctx.mirror.get("chat-weight"), Some(0.5));
        assert_eq!(ctx.gate.point_target_gating(), PointTargetGating::Eyes);
    }
}
