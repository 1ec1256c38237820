//! [`EventLoop`] – the single task that owns the [`BehaviorContext`].
//!
//! Inbound events and the periodic parameter-push tick are multiplexed in
//! one `select!`, so handlers never run concurrently with each other or
//! with the push.  A failing handler is logged and the loop carries on.

use std::time::Duration;

use eva_middleware::{BackendAdapter, TapReceiver};
use eva_types::{EvaError, InboundEvent};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::context::BehaviorContext;
use crate::router::Router;

/// Default period of the parameter-push tick.
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(1);

pub struct EventLoop {
    router: Router,
    push_interval: Duration,
}

impl EventLoop {
    pub fn new(router: Router, push_interval: Duration) -> Self {
        Self {
            router,
            push_interval,
        }
    }

    /// Dispatch one event, containing any error it raises.
    ///
    /// Returns the error for callers that want to count failures; it has
    /// already been logged.
    pub fn handle(&self, ctx: &mut BehaviorContext, event: InboundEvent) -> Option<EvaError> {
        let kind = event.kind();
        match self.router.dispatch(ctx, event) {
            Ok(()) => None,
            Err(e) => {
                warn!(event = ?kind, error = %e, "inbound event rejected");
                Some(e)
            }
        }
    }

    /// Run until `inbound` is closed, then flush the parameter mirror once
    /// more and hand the context back.
    pub async fn run(
        self,
        mut ctx: BehaviorContext,
        mut inbound: mpsc::Receiver<InboundEvent>,
    ) -> BehaviorContext {
        let mut tick = time::interval(self.push_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(push_interval = ?self.push_interval, "event loop started");

        loop {
            tokio::select! {
                biased;
                event = inbound.recv() => match event {
                    Some(event) => {
                        self.handle(&mut ctx, event);
                    }
                    None => break,
                },
                _ = tick.tick() => {
                    self.handle(&mut ctx, InboundEvent::PushParameters);
                }
            }
        }

        self.handle(&mut ctx, InboundEvent::PushParameters);
        info!("event loop stopped");
        ctx
    }
}

/// Forward everything published on the bus to `adapter` until the bus
/// closes.  Returns the number of messages delivered.
pub async fn pump_outbound<A>(mut tap: TapReceiver, adapter: &A) -> usize
where
    A: BackendAdapter + ?Sized,
{
    let mut delivered = 0;
    while let Some(message) = tap.recv().await {
        match adapter.deliver(&message).await {
            Ok(()) => {
                delivered += 1;
                debug!(topic = message.channel().topic(), "frame delivered");
            }
            Err(e) => warn!(topic = message.channel().topic(), error = %e, "delivery failed"),
        }
    }
    delivered
}
