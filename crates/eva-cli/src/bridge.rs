//! The running bridge: stdin frames in, stdout frames out.

use std::sync::Arc;
use std::time::Duration;

use eva_kernel::SWITCH_OFF;
use eva_middleware::{RosbridgeAdapter, TapReceiver, rosbridge};
use eva_runtime::{BehaviorContext, EventLoop, Router, pump_outbound};
use eva_types::InboundEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{Notify, mpsc};
use tracing::{info, warn};

/// Inbound events buffered between the reader and the event loop.
const INBOUND_CAPACITY: usize = 128;

/// Forward every decodable line of `reader` to `tx` until EOF or until the
/// event loop goes away.  Returns the number of events forwarded.
pub async fn read_inbound<R>(reader: R, tx: mpsc::Sender<InboundEvent>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match rosbridge::decode(line) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                        forwarded += 1;
                    }
                    Err(e) => warn!(error = %e, "dropping inbound frame"),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "inbound stream failed");
                break;
            }
        }
    }
    forwarded
}

/// Run until stdin closes or `shutdown` is notified.
///
/// On the way out the behaviors are switched off (recentering the face),
/// the event loop drains, and every frame still on the bus is written.
pub async fn run(
    ctx: BehaviorContext,
    tap: TapReceiver,
    push_interval: Duration,
    shutdown: Arc<Notify>,
) {
    let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);

    let pump = tokio::spawn(async move {
        let adapter = RosbridgeAdapter::new(tokio::io::stdout());
        pump_outbound(tap, &adapter).await
    });
    let event_loop = tokio::spawn(EventLoop::new(Router::standard(), push_interval).run(ctx, inbound));
    let mut reader = tokio::spawn(read_inbound(
        tokio::io::BufReader::new(tokio::io::stdin()),
        tx.clone(),
    ));

    let reader_done = tokio::select! {
        _ = shutdown.notified() => {
            info!("shutdown requested");
            false
        }
        forwarded = &mut reader => {
            info!(forwarded = forwarded.unwrap_or_default(), "inbound stream closed");
            true
        }
    };
    if !reader_done {
        reader.abort();
        // The cancelled reader drops its sender.
        let _ = reader.await;
    }

    if tx
        .send(InboundEvent::BehaviorSwitch(SWITCH_OFF.to_string()))
        .await
        .is_err()
    {
        warn!("event loop already gone; face not recentered");
    }
    drop(tx);

    match event_loop.await {
        // Dropping the context releases the last bus handle so the pump ends.
        Ok(ctx) => drop(ctx),
        Err(e) => warn!(error = %e, "event loop task failed"),
    }
    match pump.await {
        Ok(delivered) => info!(delivered, "outbound stream closed"),
        Err(e) => warn!(error = %e, "outbound task failed"),
    }
}
