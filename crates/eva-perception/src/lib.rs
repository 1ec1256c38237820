//! `eva-perception` – frame bookkeeping for the Eva bridge.
//!
//! Gaze and look-at targets arrive in the sensor (camera) frame but the
//! animation backend expects them in its own (blender) frame.  This crate
//! owns the frame graph and the cached conversion between the two.
//!
//! # Modules
//!
//! - [`transform`] – [`TfEngine`][transform::TfEngine]: directed graph of
//!   named reference frames; [`TransformListener`][transform::TransformListener]
//!   for the bounded startup wait; [`CoordinateTransform`][transform::CoordinateTransform]
//!   for the cached 4x4 point conversion.

pub mod transform;

pub use transform::{
    CoordinateTransform, Matrix4, Quaternion, TfEngine, Transform3D, TransformListener, Vec3,
};
