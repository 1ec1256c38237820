//! Category bits that enable or suppress whole classes of outbound actions.

use serde::{Deserialize, Serialize};

use crate::EvaError;

/// A class of outbound action controlled by one [`ControlMask`] bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Expression,
    Gesture,
    Soma,
    Saccade,
    Eyes,
    /// Reserved: no action is currently bound to this bit.
    Face,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Expression,
        Category::Gesture,
        Category::Soma,
        Category::Saccade,
        Category::Eyes,
        Category::Face,
    ];

    /// The mask bit for this category.
    pub fn bit(self) -> u32 {
        match self {
            Category::Expression => 1,
            Category::Gesture => 2,
            Category::Soma => 4,
            Category::Saccade => 8,
            Category::Eyes => 16,
            Category::Face => 32,
        }
    }
}

/// Bit-flag set of permitted [`Category`]s.
///
/// A cleared bit suppresses every outbound action of that category.  Bits
/// above [`Category::Face`] are preserved but never consulted, so newer
/// publishers can send wider masks.
///
/// ```
/// use eva_types::{Category, ControlMask};
///
/// let mask = ControlMask::FULL.without(Category::Gesture);
/// assert!(mask.permits(Category::Expression));
/// assert!(!mask.permits(Category::Gesture));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlMask(u32);

impl ControlMask {
    /// Full control: the value the bridge starts with.
    pub const FULL: Self = Self(255);
    pub const NONE: Self = Self(0);

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Parse the raw integer carried by a `/behavior_control` message.
    ///
    /// The wire type is a 32-bit integer; negative senders are treated as
    /// the two's-complement bit pattern.  Anything that does not fit in
    /// 32 bits is rejected.
    pub fn from_raw(raw: i64) -> Result<Self, EvaError> {
        if let Ok(bits) = u32::try_from(raw) {
            return Ok(Self(bits));
        }
        if let Ok(signed) = i32::try_from(raw) {
            return Ok(Self(signed as u32));
        }
        Err(EvaError::Configuration(format!(
            "control mask {raw} does not fit in 32 bits"
        )))
    }

    pub fn permits(self, category: Category) -> bool {
        self.0 & category.bit() != 0
    }

    #[must_use]
    pub fn with(self, category: Category) -> Self {
        Self(self.0 | category.bit())
    }

    #[must_use]
    pub fn without(self, category: Category) -> Self {
        Self(self.0 & !category.bit())
    }
}

impl Default for ControlMask {
    fn default() -> Self {
        Self::FULL
    }
}

/// Whether gaze/look point targets honour the [`Category::Eyes`] bit.
///
/// Face-id look-at is always gated by the eyes bit.  Point targets were
/// historically published unconditionally, so [`PointTargetGating::Bypass`]
/// is the default; [`PointTargetGating::Eyes`] treats them like face-id
/// look-at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointTargetGating {
    #[default]
    Bypass,
    Eyes,
}
