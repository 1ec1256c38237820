//! Bridge configuration – reads `~/.eva/config.toml` (or `$EVA_CONFIG`).
//!
//! Every field has a default, so a missing file or a partial file is fine.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eva_perception::{Quaternion, TfEngine, Transform3D, Vec3};
use eva_runtime::{BlinkTable, BridgeSettings};
use eva_types::{EvaError, PointTargetGating};
use serde::{Deserialize, Serialize};

/// A fixed frame relation loaded into the transform graph at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticTransform {
    pub parent: String,
    pub child: String,
    /// Metres, `[x, y, z]`.
    #[serde(default)]
    pub translation: [f64; 3],
    /// Unit quaternion, `[w, x, y, z]`.
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
}

impl StaticTransform {
    fn to_transform(&self) -> Transform3D {
        let [x, y, z] = self.translation;
        let [qw, qx, qy, qz] = self.rotation;
        Transform3D::new(Vec3::new(x, y, z), Quaternion::new(qw, qx, qy, qz))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Frame the animation backend works in.
    #[serde(default = "default_location_frame")]
    pub location_frame: String,

    /// Frame perception reports points in.
    #[serde(default = "default_camera_frame")]
    pub camera_frame: String,

    #[serde(default = "default_transform_timeout_secs")]
    pub transform_timeout_secs: f64,

    /// Defaults to an identity mount of `camera` under `blender`.
    #[serde(default = "default_static_transforms")]
    pub static_transforms: Vec<StaticTransform>,

    /// `bypass` (default) or `eyes`.
    #[serde(default)]
    pub point_target_gating: PointTargetGating,

    #[serde(default = "default_blink_probabilities")]
    pub blink_probabilities: BTreeMap<String, f64>,

    #[serde(default = "default_parameter_prefix")]
    pub parameter_prefix: String,

    /// Mirrored parameters and their initial values.
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,

    #[serde(default = "default_push_interval_ms")]
    pub push_interval_ms: u64,

    #[serde(default = "default_config_client_timeout_secs")]
    pub config_client_timeout_secs: f64,

    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

fn identity_rotation() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}
fn default_location_frame() -> String {
    "blender".to_string()
}
fn default_camera_frame() -> String {
    "camera".to_string()
}
fn default_static_transforms() -> Vec<StaticTransform> {
    vec![StaticTransform {
        parent: default_location_frame(),
        child: default_camera_frame(),
        translation: [0.0; 3],
        rotation: identity_rotation(),
    }]
}
fn default_transform_timeout_secs() -> f64 {
    10.0
}
fn default_blink_probabilities() -> BTreeMap<String, f64> {
    BlinkTable::default().as_map().clone()
}
fn default_parameter_prefix() -> String {
    eva_kernel::PSI_PREFIX.to_string()
}
fn default_push_interval_ms() -> u64 {
    1000
}
fn default_config_client_timeout_secs() -> f64 {
    2.0
}
fn default_bus_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            location_frame: default_location_frame(),
            camera_frame: default_camera_frame(),
            transform_timeout_secs: default_transform_timeout_secs(),
            static_transforms: default_static_transforms(),
            point_target_gating: PointTargetGating::default(),
            blink_probabilities: default_blink_probabilities(),
            parameter_prefix: default_parameter_prefix(),
            parameters: BTreeMap::new(),
            push_interval_ms: default_push_interval_ms(),
            config_client_timeout_secs: default_config_client_timeout_secs(),
            bus_capacity: default_bus_capacity(),
            rng_seed: None,
        }
    }
}

impl Config {
    /// Validate and convert into what the runtime consumes.
    ///
    /// # Errors
    ///
    /// [`EvaError::Configuration`] for negative or non-finite timeouts, a
    /// zero push interval or bus capacity, or blink probabilities outside
    /// `0..=1`.
    pub fn settings(&self) -> Result<BridgeSettings, EvaError> {
        if self.push_interval_ms == 0 {
            return Err(EvaError::Configuration(
                "push_interval_ms must be positive".to_string(),
            ));
        }
        if self.bus_capacity == 0 {
            return Err(EvaError::Configuration(
                "bus_capacity must be positive".to_string(),
            ));
        }
        Ok(BridgeSettings {
            location_frame: self.location_frame.clone(),
            camera_frame: self.camera_frame.clone(),
            transform_timeout: seconds("transform_timeout_secs", self.transform_timeout_secs)?,
            point_target_gating: self.point_target_gating,
            blink_table: BlinkTable::from_map(self.blink_probabilities.clone())?,
            parameter_prefix: self.parameter_prefix.clone(),
            parameters: self.parameters.clone(),
            config_client_timeout: seconds(
                "config_client_timeout_secs",
                self.config_client_timeout_secs,
            )?,
            rng_seed: self.rng_seed,
        })
    }

    pub fn push_interval(&self) -> Duration {
        Duration::from_millis(self.push_interval_ms)
    }

    /// A transform graph holding every configured static transform.
    pub fn transform_engine(&self) -> TfEngine {
        let mut tf = TfEngine::new();
        for st in &self.static_transforms {
            tf.set_transform(&st.parent, &st.child, st.to_transform());
        }
        tf
    }
}

fn seconds(field: &str, secs: f64) -> Result<Duration, EvaError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| EvaError::Configuration(format!("{field} = {secs}: {e}")))
}

/// `$EVA_CONFIG` if set, otherwise `~/.eva/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("EVA_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".eva").join("config.toml")
}

/// Load the config with `EVA_*` overrides applied; defaults when the file
/// does not exist.
pub fn load() -> Result<Config, EvaError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load a config file.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, EvaError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        EvaError::Configuration(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| EvaError::Configuration(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Write `cfg`, creating the parent directory if needed.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), EvaError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            EvaError::Configuration(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| EvaError::Serialization(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        EvaError::Configuration(format!("failed to write config at {}: {e}", path.display()))
    })
}

/// Apply `EVA_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `EVA_LOCATION_FRAME` | `location_frame` |
/// | `EVA_CAMERA_FRAME` | `camera_frame` |
/// | `EVA_TRANSFORM_TIMEOUT_SECS` | `transform_timeout_secs` |
/// | `EVA_POINT_TARGET_GATING` | `point_target_gating` (`bypass` / `eyes`) |
/// | `EVA_PUSH_INTERVAL_MS` | `push_interval_ms` |
/// | `EVA_RNG_SEED` | `rng_seed` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("EVA_LOCATION_FRAME") {
        cfg.location_frame = v;
    }
    if let Some(v) = var("EVA_CAMERA_FRAME") {
        cfg.camera_frame = v;
    }
    if let Some(secs) = var("EVA_TRANSFORM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        cfg.transform_timeout_secs = secs;
    }
    match var("EVA_POINT_TARGET_GATING").as_deref().map(str::trim) {
        Some("bypass") => cfg.point_target_gating = PointTargetGating::Bypass,
        Some("eyes") => cfg.point_target_gating = PointTargetGating::Eyes,
        _ => {}
    }
    if let Some(ms) = var("EVA_PUSH_INTERVAL_MS").and_then(|v| v.parse().ok()) {
        cfg.push_interval_ms = ms;
    }
    if let Some(seed) = var("EVA_RNG_SEED").and_then(|v| v.parse().ok()) {
        cfg.rng_seed = Some(seed);
    }
}
