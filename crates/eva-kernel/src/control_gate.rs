//! [`ControlGate`] – single interception point for every outbound action.
//!
//! Before an [`OutboundAction`] reaches the animation backend it must pass
//! through [`ControlGate::emit`], which applies two checks in order:
//!
//! 1. **Noop check**: named actions called `"noop"` are dropped before
//!    anything else looks at them, payload included.
//! 2. **Category check** ([`ControlMask`]): the bit of the action's
//!    [`Category`] must be set.  Actions without a category are never gated,
//!    and point targets are gated only under [`PointTargetGating::Eyes`].
//!
//! Suppression is silent: it is a normal outcome, not an error.  Only a
//! malformed payload is an error.
//!
//! The gate also owns the running flag.  Switching off publishes a face
//! recenter that deliberately skips the eyes check, so the head always comes
//! back to centre on shutdown.
//!
//! # Example
//!
//! ```
//! use eva_kernel::ControlGate;
//! use eva_middleware::EventBus;
//! use eva_types::{Channel, OutboundAction};
//!
//! let bus = EventBus::default();
//! let mut rx = bus.subscribe_to(Channel::Gesture);
//! let mut gate = ControlGate::new(bus);
//!
//! let wave = OutboundAction::Gesture {
//!     name: "wave".into(),
//!     magnitude: 0.5,
//!     repeat: 1,
//!     speed: 1.0,
//! };
//! assert!(gate.emit(wave.clone()).unwrap());
//! assert_eq!(rx.drain().len(), 1);
//!
//! // Clear the gesture bit (2) → suppressed.
//! gate.set_control_mask(255 & !2).unwrap();
//! assert!(!gate.emit(wave).unwrap());
//! assert!(rx.drain().is_empty());
//! ```

use eva_middleware::EventBus;
use eva_types::{
    Category, ControlMask, EvaError, OutboundAction, OutboundMessage, PointTargetGating,
};
use tracing::{debug, info};

/// Source tag stamped on every message the gate publishes.
pub const SOURCE: &str = "eva-kernel::control_gate";

/// Switch token that (re)starts the behavior layer.
pub const SWITCH_ON: &str = "opencog_on";
/// Switch token that suspends the behavior layer.
pub const SWITCH_OFF: &str = "opencog_off";

/// The gatekeeper for all outbound animation and behavior messages.
pub struct ControlGate {
    bus: EventBus,
    mask: ControlMask,
    running: bool,
    point_targets: PointTargetGating,
}

impl ControlGate {
    /// A running gate with full control and the default point-target policy.
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            mask: ControlMask::default(),
            running: true,
            point_targets: PointTargetGating::default(),
        }
    }

    pub fn with_point_target_gating(mut self, policy: PointTargetGating) -> Self {
        self.point_targets = policy;
        self
    }

    pub fn mask(&self) -> ControlMask {
        self.mask
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn point_target_gating(&self) -> PointTargetGating {
        self.point_targets
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// `true` when `action` would be published under the current mask.
    pub fn permits(&self, action: &OutboundAction) -> bool {
        if action.is_noop() {
            return false;
        }
        if action.is_point_target() && self.point_targets == PointTargetGating::Bypass {
            return true;
        }
        match action.category() {
            Some(category) => self.mask.permits(category),
            None => true,
        }
    }

    /// Publish `action` on its channel unless the gate suppresses it.
    ///
    /// Returns `Ok(true)` when the action was published and `Ok(false)` when
    /// it was suppressed by the noop or category check.
    ///
    /// # Errors
    ///
    /// [`EvaError::Configuration`] when the payload is malformed; nothing is
    /// published in that case.
    pub fn emit(&self, action: OutboundAction) -> Result<bool, EvaError> {
        if action.is_noop() {
            debug!(channel = ?action.channel(), "noop dropped");
            return Ok(false);
        }
        action.validate()?;
        if !self.permits(&action) {
            debug!(channel = ?action.channel(), mask = self.mask.bits(), "action suppressed");
            return Ok(false);
        }
        self.publish(action)?;
        Ok(true)
    }

    /// Replace the control mask with the raw `/behavior_control` value.
    ///
    /// # Errors
    ///
    /// [`EvaError::Configuration`] when `raw` does not fit in 32 bits; the
    /// previous mask is kept.
    pub fn set_control_mask(&mut self, raw: i64) -> Result<ControlMask, EvaError> {
        let mask = ControlMask::from_raw(raw)?;
        if mask != self.mask {
            info!(old = self.mask.bits(), new = mask.bits(), "control mask replaced");
        }
        self.mask = mask;
        Ok(mask)
    }

    /// Apply a behavior switch token.
    ///
    /// Returns `Ok(true)` when the running flag changed.  Unrecognised tokens
    /// and switches into the current state are ignored.
    pub fn set_running(&mut self, token: &str) -> Result<bool, EvaError> {
        match token {
            SWITCH_ON if !self.running => {
                self.running = true;
                info!("behaviors switched on");
                Ok(true)
            }
            SWITCH_OFF if self.running => {
                self.running = false;
                info!("behaviors switched off; recentering face");
                // Bypass the eyes bit: the face must recenter even when eye
                // messages are disabled.
                self.publish(OutboundAction::FaceIndex { id: 0 })?;
                self.publish(OutboundAction::GazeAtFace { id: 0 })?;
                Ok(true)
            }
            SWITCH_ON | SWITCH_OFF => Ok(false),
            other => {
                debug!(token = other, "ignoring unrecognised behavior switch token");
                Ok(false)
            }
        }
    }

    fn publish(&self, action: OutboundAction) -> Result<usize, EvaError> {
        debug!(channel = ?action.channel(), "publishing action");
        self.bus.publish(OutboundMessage::new(SOURCE, action))
    }
}

/// Category ↔ example action pairs, shared with the property tests.
#[cfg(test)]
pub(crate) fn sample_action(category: Category) -> Option<OutboundAction> {
    use eva_types::SaccadeCycle;
    match category {
        Category::Expression => Some(OutboundAction::Expression {
            name: "happy".into(),
            magnitude: 0.5,
            duration_secs: 2.0,
        }),
        Category::Gesture => Some(OutboundAction::Gesture {
            name: "nod-1".into(),
            magnitude: 0.8,
            repeat: 2,
            speed: 1.0,
        }),
        Category::Soma => Some(OutboundAction::SomaState {
            name: "normal".into(),
            magnitude: 0.1,
            rate: 1.0,
            ease_in_secs: 3.0,
        }),
        Category::Saccade => Some(OutboundAction::Saccade(SaccadeCycle::explore())),
        Category::Eyes => Some(OutboundAction::FaceIndex { id: 7 }),
        Category::Face => None,
    }
}
