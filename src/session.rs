use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use log::{debug, error, info, trace, warn};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{LinkError, Result};
use crate::frame::{self, Measurement};
use crate::signal::{SessionState, Termination};
use crate::transport::{Link, NotificationHandler, PeripheralRef, Radio};

/// How often a subscribed session checks that the link is still up.
pub const LIVENESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Receives every decoded reading. Called from the notification task, so it
/// must hand the value off rather than do slow work inline.
pub type Sink = Arc<dyn Fn(Measurement) + Send + Sync>;

/// One connect → subscribe → hold → teardown cycle against a single peripheral.
pub struct Session<'a, R: Radio> {
    radio: &'a R,
    cancel: CancellationToken,
    poll_interval: Duration,
    state: SessionState,
}

impl<'a, R: Radio> Session<'a, R> {
    pub fn new(radio: &'a R, cancel: CancellationToken, poll_interval: Duration) -> Self {
        Session {
            radio,
            cancel,
            poll_interval,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: SessionState) {
        debug!("Session state {} -> {}", self.state, next);
        self.state = next;
    }

    pub async fn run(&mut self, peripheral: PeripheralRef, sink: Sink) -> Termination {
        self.transition(SessionState::Connecting);

        let mut link = match self.radio.connect(&peripheral).await {
            Ok(link) => link,
            Err(err) => {
                warn!("Error connecting to {peripheral}: {err}");
                self.transition(SessionState::Failed);
                return Termination::ConnectFailed;
            }
        };

        // Readings only reach the sink while this is set, i.e. while Subscribed.
        let gate = Arc::new(AtomicBool::new(false));

        let reason = match link.subscribe(forward_to(sink, gate.clone())).await {
            Ok(()) => {
                self.transition(SessionState::Subscribed);
                gate.store(true, Ordering::Release);
                info!("Receiving heart rate from {peripheral}");

                let held = AssertUnwindSafe(hold(&link, &self.cancel, self.poll_interval))
                    .catch_unwind()
                    .await;
                gate.store(false, Ordering::Release);

                held.unwrap_or_else(|_| {
                    error!("Session with {peripheral} panicked while subscribed");
                    Termination::LinkDropped
                })
            }
            Err(err) => {
                warn!("Error subscribing to {peripheral}: {err}");
                Termination::ConnectFailed
            }
        };

        self.transition(SessionState::Disconnecting);
        if let Err(err) = teardown(&mut link, &peripheral).await {
            error!("{err}");
        }

        self.transition(match reason {
            Termination::ConnectFailed => SessionState::Failed,
            _ => SessionState::Idle,
        });
        reason
    }
}

fn forward_to(sink: Sink, gate: Arc<AtomicBool>) -> NotificationHandler {
    Arc::new(move |data: &[u8]| {
        if !gate.load(Ordering::Acquire) {
            trace!("Notification outside subscription dropped");
            return;
        }
        match frame::decode(data) {
            Ok(heart_rate) => {
                debug!("heartbeat: {heart_rate}");
                sink(heart_rate);
            }
            Err(err) => warn!("Dropping notification {data:02x?}: {err}"),
        }
    })
}

async fn hold<L: Link>(
    link: &L,
    cancel: &CancellationToken,
    poll_interval: Duration,
) -> Termination {
    let mut liveness = tokio::time::interval(poll_interval);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Session cancelled");
                return Termination::Cancelled;
            }
            _ = liveness.tick() => match link.is_connected().await {
                Ok(true) => {}
                Ok(false) => {
                    warn!("Link dropped");
                    return Termination::LinkDropped;
                }
                Err(err) => {
                    warn!("Liveness check failed, treating link as dropped: {err}");
                    return Termination::LinkDropped;
                }
            },
        }
    }
}

/// Unsubscribes (failure ignored) and then disconnects. Only a failed
/// disconnect is reported, and only so it can be logged.
async fn teardown<L: Link>(link: &mut L, peripheral: &PeripheralRef) -> Result<()> {
    if let Err(err) = link.unsubscribe().await {
        debug!("Unsubscribe from {peripheral} failed: {err}");
    }

    match link.disconnect().await {
        Ok(()) => {
            info!("Disconnected from {peripheral}");
            Ok(())
        }
        Err(err) => Err(LinkError::Teardown(format!("disconnect from {peripheral}: {err}"))),
    }
}
