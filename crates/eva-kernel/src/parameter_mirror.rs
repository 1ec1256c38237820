//! [`ParameterMirror`] – cached copy of the rule-weight parameters.
//!
//! The decision layer reports parameter changes one at a time; the mirror
//! remembers the last value of each known parameter and only marks itself
//! dirty when a value actually changes.  A periodic tick then pushes the
//! whole mirror downstream as one batch through a [`ConfigClient`].
//!
//! When no client could be reached at startup the mirror runs degraded:
//! pushes become no-ops, and each distinct failure cause is logged once.

use std::collections::{BTreeMap, HashSet};
use std::thread;
use std::time::{Duration, Instant};

use eva_middleware::EventBus;
use eva_types::{Channel, EvaError, OutboundAction, OutboundMessage};
use tracing::{debug, info, warn};

/// Prefix the decision layer puts in front of mirrored parameter names.
pub const PSI_PREFIX: &str = "OpenPsi: ";

const CLIENT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Downstream consumer of batched parameter updates.
pub trait ConfigClient: Send {
    fn update_configuration(&mut self, values: &BTreeMap<String, f64>) -> Result<(), EvaError>;
}

/// [`ConfigClient`] that publishes a [`OutboundAction::ParameterBatch`] on
/// the parameter-config channel of the bus.
pub struct BusConfigClient {
    bus: EventBus,
}

impl BusConfigClient {
    /// Wait up to `timeout` for someone to listen on the parameter channel.
    ///
    /// # Errors
    ///
    /// [`EvaError::DegradedMode`] if nobody subscribed in time.
    pub fn connect(bus: EventBus, timeout: Duration) -> Result<Self, EvaError> {
        let deadline = Instant::now() + timeout;
        loop {
            if bus.listener_count(Channel::ParameterConfig) > 0 {
                return Ok(Self { bus });
            }
            if Instant::now() >= deadline {
                return Err(EvaError::DegradedMode(format!(
                    "no listener on {} after {:?}",
                    Channel::ParameterConfig.topic(),
                    timeout
                )));
            }
            thread::sleep(CLIENT_POLL_INTERVAL);
        }
    }
}

impl ConfigClient for BusConfigClient {
    fn update_configuration(&mut self, values: &BTreeMap<String, f64>) -> Result<(), EvaError> {
        let message = OutboundMessage::new(
            "eva-kernel::parameter_mirror",
            OutboundAction::ParameterBatch(values.clone()),
        );
        let delivered = self.bus.publish(message)?;
        if delivered == 0 {
            return Err(EvaError::Channel(format!(
                "nobody is listening on {}",
                Channel::ParameterConfig.topic()
            )));
        }
        Ok(())
    }
}

/// Result of one [`ParameterMirror::push_pending`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Nothing changed since the last push.
    Clean,
    /// The whole mirror (this many entries) was pushed.
    Pushed(usize),
    /// Changes are pending but could not be pushed.
    Skipped,
}

/// Name → last known value, plus the dirty flag.
pub struct ParameterMirror {
    prefix: String,
    values: BTreeMap<String, f64>,
    dirty: bool,
    client: Option<Box<dyn ConfigClient>>,
    unavailable: String,
    reported: HashSet<String>,
}

impl ParameterMirror {
    /// An empty mirror with no client (degraded until one is attached).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            values: BTreeMap::new(),
            dirty: false,
            client: None,
            unavailable: "no configuration client configured".to_string(),
            reported: HashSet::new(),
        }
    }

    pub fn with_client(mut self, client: Box<dyn ConfigClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Run without a client; `cause` is logged the first time a push is
    /// skipped.
    pub fn degraded(mut self, cause: &EvaError) -> Self {
        self.client = None;
        self.unavailable = cause.to_string();
        self
    }

    /// Start mirroring `name` with an initial value.  Does not dirty the
    /// mirror.
    pub fn register(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Record a reported parameter value.
    ///
    /// The prefix is stripped from `name`; unknown keys and unchanged values
    /// are ignored.  Returns `Ok(true)` when the mirror changed.
    ///
    /// # Errors
    ///
    /// [`EvaError::Configuration`] for a non-finite value.
    pub fn update(&mut self, name: &str, value: f64) -> Result<bool, EvaError> {
        if !value.is_finite() {
            return Err(EvaError::Configuration(format!(
                "parameter {name} has non-finite value {value}"
            )));
        }
        let key = name.strip_prefix(self.prefix.as_str()).unwrap_or(name).trim();
        match self.values.get_mut(key) {
            Some(stored) if *stored != value => {
                debug!(parameter = key, old = *stored, new = value, "parameter changed");
                *stored = value;
                self.dirty = true;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                debug!(parameter = key, "ignoring update for unmirrored parameter");
                Ok(false)
            }
        }
    }

    /// Push the whole mirror if it is dirty and a client is available.
    ///
    /// Push failures keep the mirror dirty so the next tick retries; each
    /// distinct failure cause is logged only once.
    pub fn push_pending(&mut self) -> PushOutcome {
        if !self.dirty {
            return PushOutcome::Clean;
        }
        let Some(client) = self.client.as_mut() else {
            let cause = self.unavailable.clone();
            self.report_once(cause);
            return PushOutcome::Skipped;
        };
        match client.update_configuration(&self.values) {
            Ok(()) => {
                self.dirty = false;
                info!(count = self.values.len(), "pushed parameter updates");
                PushOutcome::Pushed(self.values.len())
            }
            Err(e) => {
                self.report_once(e.to_string());
                PushOutcome::Skipped
            }
        }
    }

    fn report_once(&mut self, cause: String) {
        if self.reported.insert(cause.clone()) {
            warn!(cause = %cause, "parameter push skipped");
        }
    }
}
