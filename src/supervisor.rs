use std::time::Duration;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::SupervisorConfig;
use crate::locator::locate;
use crate::session::{Session, Sink, LIVENESS_POLL_INTERVAL};
use crate::signal::SessionState;
use crate::transport::Radio;

/// Keeps one link to the configured peripheral alive until cancelled.
///
/// Every way a cycle can end (nothing found, connect failure, dropped link) is
/// followed by the same fixed `retry_interval` pause and a fresh scan cycle.
/// There is no attempt cap and the interval never grows.
pub struct Supervisor<R: Radio> {
    radio: R,
    config: SupervisorConfig,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl<R: Radio> Supervisor<R> {
    pub fn new(radio: R, config: SupervisorConfig, cancel: CancellationToken) -> Self {
        Supervisor {
            radio,
            config,
            cancel,
            poll_interval: LIVENESS_POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn run(&self, sink: Sink) {
        let config = &self.config;
        info!("Watching for peripherals named like {:?}", config.device_name_filter);

        while !self.cancel.is_cancelled() {
            let mut session = Session::new(&self.radio, self.cancel.clone(), self.poll_interval);
            session.transition(SessionState::Scanning);

            let located = locate(
                &self.radio,
                &config.device_name_filter,
                config.scan_timeout,
                config.max_scan_attempts,
            )
            .await;

            // A scan cycle isn't interrupted, so cancellation may have arrived meanwhile.
            if self.cancel.is_cancelled() {
                break;
            }

            match located {
                Ok(peripheral) => {
                    let reason = session.run(peripheral, sink.clone()).await;
                    info!("Session ended ({reason}), state {}", session.state());
                }
                Err(err) => {
                    session.transition(SessionState::Idle);
                    warn!("{err}");
                }
            }

            if !self.wait_before_retry().await {
                break;
            }
        }

        info!("Supervisor stopped");
    }

    /// Sleeps for the retry interval. Returns false if cancelled meanwhile.
    async fn wait_before_retry(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        info!("Retrying in {:?}", self.config.retry_interval);
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.retry_interval) => true,
        }
    }
}
