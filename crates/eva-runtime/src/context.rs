//! [`BehaviorContext`] – all mutable state the router's handlers touch.
//!
//! One task owns the context, so handlers receive `&mut BehaviorContext`
//! and no locking is needed.

use std::collections::BTreeMap;

use eva_kernel::{ControlGate, ParameterMirror};
use eva_perception::CoordinateTransform;
use eva_types::EvaError;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Blink trigger → probability that the request turns into a blink.
#[derive(Debug, Clone, PartialEq)]
pub struct BlinkTable {
    probabilities: BTreeMap<String, f64>,
}

impl BlinkTable {
    /// Build a table from explicit entries.
    ///
    /// # Errors
    ///
    /// [`EvaError::Configuration`] if any probability lies outside `0..=1`.
    pub fn from_map(probabilities: BTreeMap<String, f64>) -> Result<Self, EvaError> {
        if let Some((trigger, p)) = probabilities
            .iter()
            .find(|(_, p)| !(0.0..=1.0).contains(*p))
        {
            return Err(EvaError::Configuration(format!(
                "blink probability for {trigger} must be within 0..=1, got {p}"
            )));
        }
        Ok(Self { probabilities })
    }

    /// # Errors
    ///
    /// [`EvaError::UnknownTrigger`] when `trigger` has no entry.
    pub fn probability(&self, trigger: &str) -> Result<f64, EvaError> {
        self.probabilities
            .get(trigger)
            .copied()
            .ok_or_else(|| EvaError::UnknownTrigger(trigger.to_string()))
    }

    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        self.probabilities.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.probabilities
    }
}

impl Default for BlinkTable {
    fn default() -> Self {
        let probabilities = [("chat_heard", 0.4), ("chat_saying", 0.7), ("tts_end", 0.7)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Self { probabilities }
    }
}

/// Everything a handler may read or change.
pub struct BehaviorContext {
    pub gate: ControlGate,
    pub mirror: ParameterMirror,
    pub transform: CoordinateTransform,
    pub blinks: BlinkTable,
    rng: Box<dyn RngCore + Send>,
    available_gestures: Vec<String>,
    available_expressions: Vec<String>,
}

impl BehaviorContext {
    /// A context with the default blink table and an entropy-seeded RNG.
    pub fn new(gate: ControlGate, mirror: ParameterMirror, transform: CoordinateTransform) -> Self {
        Self {
            gate,
            mirror,
            transform,
            blinks: BlinkTable::default(),
            rng: Box::new(StdRng::from_entropy()),
            available_gestures: Vec::new(),
            available_expressions: Vec::new(),
        }
    }

    pub fn with_blink_table(mut self, blinks: BlinkTable) -> Self {
        self.blinks = blinks;
        self
    }

    /// Replace the random source used for blink draws.
    pub fn with_rng(mut self, rng: impl RngCore + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Shorthand for a reproducible [`StdRng`].
    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    /// One uniform sample in `[0, 1)`.
    pub fn sample_unit(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }

    pub fn available_gestures(&self) -> &[String] {
        &self.available_gestures
    }

    pub fn available_expressions(&self) -> &[String] {
        &self.available_expressions
    }

    pub(crate) fn set_available_gestures(&mut self, gestures: Vec<String>) {
        self.available_gestures = gestures;
    }

    pub(crate) fn set_available_expressions(&mut self, expressions: Vec<String>) {
        self.available_expressions = expressions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eva_kernel::PSI_PREFIX;
    use eva_middleware::EventBus;

    fn context() -> BehaviorContext {
        BehaviorContext::new(
            ControlGate::new(EventBus::default()),
            ParameterMirror::new(PSI_PREFIX),
            CoordinateTransform::identity("blender"),
        )
    }

    #[test]
    fn default_table_has_chat_triggers() {
        let table = BlinkTable::default();
        assert_eq!(table.probability("chat_heard").unwrap(), 0.4);
        assert_eq!(table.probability("chat_saying").unwrap(), 0.7);
        assert_eq!(table.probability("tts_end").unwrap(), 0.7);
        assert_eq!(table.triggers().count(), 3);
    }

    #[test]
    fn unknown_trigger_is_an_error() {
        assert_eq!(
            BlinkTable::default().probability("sneeze"),
            Err(EvaError::UnknownTrigger("sneeze".to_string()))
        );
    }

    #[test]
    fn table_rejects_out_of_range_probability() {
        let mut map = BTreeMap::new();
        map.insert("chat_heard".to_string(), 1.5);
        assert!(matches!(
            BlinkTable::from_map(map),
            Err(EvaError::Configuration(_))
        ));
    }

    #[test]
    fn same_seed_same_samples() {
        let mut a = context().with_seed(7);
        let mut b = context().with_seed(7);
        for _ in 0..10 {
            let s = a.sample_unit();
            assert!((0.0..1.0).contains(&s));
            assert_eq!(s, b.sample_unit());
        }
    }
}
