//! [`Router`] – explicit table from inbound event kind to handler.
//!
//! Every handler turns one [`InboundEvent`] into at most one call on the
//! [`ControlGate`][eva_kernel::ControlGate] (the switch handler may also
//! trigger the recenter side effect).  Nothing here blocks.

use std::collections::HashMap;

use eva_types::{EvaError, InboundEvent, InboundKind, OutboundAction, SaccadeCycle, SaccadeMode};
use tracing::{debug, info};

use crate::context::BehaviorContext;

/// Phrase that makes the robot stop talking, matched case-insensitively.
pub const SHUT_UP: &str = "shut up";

/// A routing-table entry.
pub type Handler = fn(&mut BehaviorContext, InboundEvent) -> Result<(), EvaError>;

#[derive(Clone, Default)]
pub struct Router {
    table: HashMap<InboundKind, Handler>,
}

impl Router {
    /// A router with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full set of bindings for the bridge.
    pub fn standard() -> Self {
        let mut router = Self::new();
        router.bind(InboundKind::BehaviorSwitch, on_behavior_switch);
        router.bind(InboundKind::BehaviorControl, on_behavior_control);
        router.bind(InboundKind::AffectPerceived, on_affect_perceived);
        router.bind(InboundKind::SpeechHeard, on_speech_heard);
        router.bind(InboundKind::BlinkRequested, on_blink_requested);
        router.bind(InboundKind::GazeAtPoint, on_point_target);
        router.bind(InboundKind::LookAtPoint, on_point_target);
        router.bind(InboundKind::ParameterUpdate, on_parameter_update);
        router.bind(InboundKind::PushParameters, on_push_parameters);
        router.bind(InboundKind::Perform, on_perform);
        router.bind(InboundKind::Saccade, on_saccade);
        router.bind(InboundKind::BlinkRate, on_blink_rate);
        router.bind(InboundKind::GoToSleep, on_sleep_or_wake);
        router.bind(InboundKind::WakeUp, on_sleep_or_wake);
        router.bind(InboundKind::AvailableGestures, on_available_list);
        router.bind(InboundKind::AvailableExpressions, on_available_list);
        router
    }

    /// Bind `handler` to `kind`, returning the handler it replaced.
    pub fn bind(&mut self, kind: InboundKind, handler: Handler) -> Option<Handler> {
        self.table.insert(kind, handler)
    }

    pub fn handles(&self, kind: InboundKind) -> bool {
        self.table.contains_key(&kind)
    }

    /// Run the handler bound to the event's kind.
    ///
    /// # Errors
    ///
    /// Whatever the handler returns, or [`EvaError::Configuration`] when no
    /// handler is bound.
    pub fn dispatch(&self, ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
        let kind = event.kind();
        let handler = self.table.get(&kind).ok_or_else(|| {
            EvaError::Configuration(format!("no handler bound for {kind:?}"))
        })?;
        handler(ctx, event)
    }
}

fn mismatched(event: &InboundEvent) -> EvaError {
    EvaError::Configuration(format!("handler bound to the wrong event: {:?}", event.kind()))
}

fn on_behavior_switch(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::BehaviorSwitch(token) = event else {
        return Err(mismatched(&event));
    };
    ctx.gate.set_running(&token)?;
    Ok(())
}

fn on_behavior_control(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::BehaviorControl(raw) = event else {
        return Err(mismatched(&event));
    };
    ctx.gate.set_control_mask(raw)?;
    Ok(())
}

fn on_affect_perceived(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::AffectPerceived(affect) = event else {
        return Err(mismatched(&event));
    };
    ctx.gate.emit(OutboundAction::AffectExpress(affect))?;
    Ok(())
}

fn on_speech_heard(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::SpeechHeard { utterance, confidence } = event else {
        return Err(mismatched(&event));
    };
    if utterance.to_lowercase().contains(SHUT_UP) {
        info!(confidence, "stop-talking request heard");
        ctx.gate.emit(OutboundAction::TtsStop)?;
    }
    Ok(())
}

fn on_blink_requested(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::BlinkRequested(trigger) = event else {
        return Err(mismatched(&event));
    };
    let p = ctx.blinks.probability(&trigger)?;
    let sample = ctx.sample_unit();
    if sample < p {
        ctx.gate.emit(OutboundAction::blink())?;
    } else {
        debug!(trigger = %trigger, sample, p, "blink draw lost");
    }
    Ok(())
}

fn on_point_target(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let action = match event {
        InboundEvent::GazeAtPoint(p) => OutboundAction::GazeTarget(ctx.transform.to_target(p)),
        InboundEvent::LookAtPoint(p) => OutboundAction::LookTarget(ctx.transform.to_target(p)),
        other => return Err(mismatched(&other)),
    };
    ctx.gate.emit(action)?;
    Ok(())
}

fn on_parameter_update(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::ParameterUpdate { name, value } = event else {
        return Err(mismatched(&event));
    };
    ctx.mirror.update(&name, value)?;
    Ok(())
}

fn on_push_parameters(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    if !matches!(event, InboundEvent::PushParameters) {
        return Err(mismatched(&event));
    }
    ctx.mirror.push_pending();
    Ok(())
}

fn on_perform(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::Perform(action) = event else {
        return Err(mismatched(&event));
    };
    ctx.gate.emit(action)?;
    Ok(())
}

fn on_saccade(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::Saccade(mode) = event else {
        return Err(mismatched(&event));
    };
    let cycle = match mode {
        SaccadeMode::Explore => SaccadeCycle::explore(),
        SaccadeMode::Conversational => SaccadeCycle::conversational(),
        SaccadeMode::Listening => SaccadeCycle::listening(),
    };
    ctx.gate.emit(OutboundAction::Saccade(cycle))?;
    Ok(())
}

fn on_blink_rate(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    let InboundEvent::BlinkRate { mean, variation } = event else {
        return Err(mismatched(&event));
    };
    ctx.gate.emit(OutboundAction::BlinkCycle { mean, variation })?;
    Ok(())
}

// Sleeping is disabled on the animation side; both transitions settle the
// body into the same relaxed soma state.
fn on_sleep_or_wake(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    if !matches!(event, InboundEvent::GoToSleep | InboundEvent::WakeUp) {
        return Err(mismatched(&event));
    }
    ctx.gate.emit(OutboundAction::SomaState {
        name: "normal".to_string(),
        magnitude: 0.1,
        rate: 1.0,
        ease_in_secs: 3.0,
    })?;
    Ok(())
}

fn on_available_list(ctx: &mut BehaviorContext, event: InboundEvent) -> Result<(), EvaError> {
    match event {
        InboundEvent::AvailableGestures(gestures) => {
            info!(?gestures, "available gestures");
            ctx.set_available_gestures(gestures);
        }
        InboundEvent::AvailableExpressions(expressions) => {
            info!(?expressions, "available facial expressions");
            ctx.set_available_expressions(expressions);
        }
        other => return Err(mismatched(&other)),
    }
    Ok(())
}
