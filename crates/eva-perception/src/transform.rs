//! Transform Frame (TF) Engine.
//!
//! Maintains a directed graph of named reference frames and the 3-D rigid-body
//! transforms (translation + quaternion rotation) that relate them.  Given any
//! two frame names the engine composes a chain of transforms via BFS.
//!
//! On top of the graph sit the two pieces the bridge actually uses:
//!
//! * [`TransformListener::wait_for_transform`] – the one blocking call at
//!   startup, bounded by a timeout.
//! * [`CoordinateTransform`] – the 4x4 conversion matrix derived once from
//!   that lookup and cached for the life of the process.
//!
//! # Example
//!
//! ```rust
//! use eva_perception::transform::{CoordinateTransform, Quaternion, TfEngine, Transform3D, Vec3};
//! use eva_types::Point3;
//!
//! let mut tf = TfEngine::new();
//! // The camera sits 0.5 m in front of the animation origin.
//! tf.set_transform("blender", "camera",
//!     Transform3D::new(Vec3::new(0.5, 0.0, 0.0), Quaternion::identity()));
//!
//! let t = tf.lookup("blender", "camera").unwrap();
//! let conv = CoordinateTransform::from_transform("camera", "blender", t).unwrap();
//! let p = conv.to_target(Point3::new(1.0, 0.0, 0.0));
//! assert!((p.x - 1.5).abs() < 1e-12);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use eva_types::{EvaError, Point3};
use tracing::{debug, info};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Scale to unit length, or `None` for the zero quaternion.
    pub fn normalized(self) -> Option<Self> {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if !n.is_finite() || n < 1e-12 {
            return None;
        }
        Some(Self::new(self.w / n, self.x / n, self.y / n, self.z / n))
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: if `self` = T_A_B and `other` = T_B_C, the
    /// result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Matrix4
// ────────────────────────────────────────────────────────────────────────────

/// Row-major 4x4 homogeneous matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4(pub [[f64; 4]; 4]);

impl Matrix4 {
    pub fn identity() -> Self {
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self(m)
    }

    /// Build the matrix for a translation and rotation, the same layout
    /// `tf`'s `fromTranslationRotation` produces.  The rotation is
    /// normalised first; `None` for a zero rotation.
    pub fn from_translation_rotation(translation: Vec3, rotation: Quaternion) -> Option<Self> {
        let Quaternion { w, x, y, z } = rotation.normalized()?;
        Some(Self([
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - w * z),
                2.0 * (x * z + w * y),
                translation.x,
            ],
            [
                2.0 * (x * y + w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - w * x),
                translation.y,
            ],
            [
                2.0 * (x * z - w * y),
                2.0 * (y * z + w * x),
                1.0 - 2.0 * (x * x + y * y),
                translation.z,
            ],
            [0.0, 0.0, 0.0, 1.0],
        ]))
    }

    /// Apply to `(x, y, z, 1)` and keep the first three components.
    pub fn transform_point(&self, p: Point3) -> Point3 {
        let m = &self.0;
        let v = [p.x, p.y, p.z, 1.0];
        let row = |r: usize| m[r].iter().zip(v.iter()).map(|(a, b)| a * b).sum::<f64>();
        Point3::new(row(0), row(1), row(2))
    }

    /// Inverse of an affine matrix (bottom row `0 0 0 1`), or `None` when
    /// the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let m = &self.0;
        let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        // Adjugate of the 3x3 linear part.
        let a = [
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
            ],
        ];
        let t = [m[0][3], m[1][3], m[2][3]];
        let mut out = [[0.0; 4]; 4];
        for r in 0..3 {
            out[r][..3].copy_from_slice(&a[r]);
            out[r][3] = -(a[r][0] * t[0] + a[r][1] * t[1] + a[r][2] * t[2]);
        }
        out[3][3] = 1.0;
        Some(Self(out))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

/// A directed graph of named reference frames and the [`Transform3D`]s that
/// relate them.
///
/// Edges are directional: `set_transform("A", "B", t)` records the pose of
/// `B` in `A`, and does not create the inverse.
#[derive(Debug, Default)]
pub struct TfEngine {
    /// `edges[parent][child] = pose of child in parent`
    edges: HashMap<String, HashMap<String, Transform3D>>,
}

impl TfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update the pose of `child_frame` in `parent_frame`.
    pub fn set_transform(&mut self, parent_frame: &str, child_frame: &str, transform: Transform3D) {
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), transform);
    }

    /// The transform that maps points expressed in `source_frame` into
    /// `target_frame`, following parent → child edges from the target.
    ///
    /// Returns `None` if no path exists between the two frames.
    pub fn lookup(&self, target_frame: &str, source_frame: &str) -> Option<Transform3D> {
        if source_frame == target_frame {
            return Some(Transform3D::identity());
        }

        // BFS over the directed graph; each queue item carries the composed
        // transform accumulated from target_frame to the current node.
        let mut queue: VecDeque<(String, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<String> = HashSet::new();

        queue.push_back((target_frame.to_string(), Transform3D::identity()));
        visited.insert(target_frame.to_string());

        while let Some((current, accumulated)) = queue.pop_front() {
            if let Some(neighbours) = self.edges.get(&current) {
                for (next, edge_tf) in neighbours {
                    if visited.contains(next) {
                        continue;
                    }
                    let composed = accumulated.compose(*edge_tf);
                    if next == source_frame {
                        return Some(composed);
                    }
                    visited.insert(next.clone());
                    queue.push_back((next.clone(), composed));
                }
            }
        }

        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TransformListener
// ────────────────────────────────────────────────────────────────────────────

/// Shared handle on a [`TfEngine`] that other tasks may still be filling.
#[derive(Debug, Clone, Default)]
pub struct TransformListener {
    buffer: Arc<RwLock<TfEngine>>,
}

impl TransformListener {
    pub fn new(engine: TfEngine) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(engine)),
        }
    }

    /// Add or replace an edge while others may be waiting on it.
    ///
    /// # Errors
    ///
    /// [`EvaError::Channel`] if the buffer lock was poisoned.
    pub fn set_transform(
        &self,
        parent_frame: &str,
        child_frame: &str,
        transform: Transform3D,
    ) -> Result<(), EvaError> {
        let mut engine = self
            .buffer
            .write()
            .map_err(|_| EvaError::Channel("transform buffer lock poisoned".to_string()))?;
        engine.set_transform(parent_frame, child_frame, transform);
        Ok(())
    }

    /// Block until `source_frame` can be expressed in `target_frame`, or
    /// until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// [`EvaError::FatalStartup`] on timeout or a poisoned buffer.
    pub fn wait_for_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<Transform3D, EvaError> {
        let deadline = Instant::now() + timeout;
        loop {
            let found = self
                .buffer
                .read()
                .map_err(|_| EvaError::FatalStartup("transform buffer lock poisoned".to_string()))?
                .lookup(target_frame, source_frame);
            if let Some(t) = found {
                info!(target = target_frame, source = source_frame, "transform available");
                return Ok(t);
            }
            if Instant::now() >= deadline {
                return Err(EvaError::FatalStartup(format!(
                    "no transform from {source_frame} to {target_frame} within {timeout:?}"
                )));
            }
            debug!(target = target_frame, source = source_frame, "waiting for transform");
            thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CoordinateTransform
// ────────────────────────────────────────────────────────────────────────────

/// Cached conversion from the sensor frame into the animation frame.
///
/// Computed once at startup and never refreshed; every conversion is a pure
/// function of the stored matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateTransform {
    source_frame: String,
    target_frame: String,
    forward: Matrix4,
    inverse: Matrix4,
}

impl CoordinateTransform {
    /// # Errors
    ///
    /// [`EvaError::FatalStartup`] when `transform` has a zero rotation.
    pub fn from_transform(
        source_frame: &str,
        target_frame: &str,
        transform: Transform3D,
    ) -> Result<Self, EvaError> {
        let forward = Matrix4::from_translation_rotation(transform.translation, transform.rotation)
            .ok_or_else(|| {
                EvaError::FatalStartup(format!(
                    "transform from {source_frame} to {target_frame} has a zero rotation"
                ))
            })?;
        Self::from_matrix(source_frame, target_frame, forward)
    }

    /// Use a precomputed matrix, e.g. in tests.
    ///
    /// # Errors
    ///
    /// [`EvaError::FatalStartup`] when `forward` is singular.
    pub fn from_matrix(
        source_frame: &str,
        target_frame: &str,
        forward: Matrix4,
    ) -> Result<Self, EvaError> {
        let inverse = forward.inverse().ok_or_else(|| {
            EvaError::FatalStartup(format!(
                "transform from {source_frame} to {target_frame} is singular"
            ))
        })?;
        Ok(Self {
            source_frame: source_frame.to_string(),
            target_frame: target_frame.to_string(),
            forward,
            inverse,
        })
    }

    /// Both frames the same; points pass through unchanged.
    pub fn identity(frame: &str) -> Self {
        Self {
            source_frame: frame.to_string(),
            target_frame: frame.to_string(),
            forward: Matrix4::identity(),
            inverse: Matrix4::identity(),
        }
    }

    pub fn to_target(&self, p: Point3) -> Point3 {
        self.forward.transform_point(p)
    }

    pub fn to_source(&self, p: Point3) -> Point3 {
        self.inverse.transform_point(p)
    }

    pub fn matrix(&self) -> &Matrix4 {
        &self.forward
    }

    pub fn source_frame(&self) -> &str {
        &self.source_frame
    }

    pub fn target_frame(&self) -> &str {
        &self.target_frame
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
