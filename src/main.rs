use std::sync::Arc;

use anyhow::Result;
use env_logger::Env;
use log::{info, warn};
use tokio::spawn;
use tokio::sync::mpsc::{self, Receiver as TokioReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod ble;
mod config;
mod error;
mod fake;
mod frame;
mod locator;
mod session;
mod signal;
mod supervisor;
mod transport;

#[cfg(test)]
mod testing;

use ble::BtleRadio;
use config::SupervisorConfig;
use fake::SimulatedRadio;
use frame::Measurement;
use session::Sink;
use supervisor::Supervisor;
use transport::Radio;

const DEFAULT_CONFIG_PATH: &str = "config.json";
const READING_CHANNEL_CAPACITY: usize = 128;


#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let mut config_path = DEFAULT_CONFIG_PATH.to_string();
    let mut simulate = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--simulate" => simulate = true,
            _ => config_path = arg,
        }
    }

    let config = SupervisorConfig::load(&config_path);
    let cancel = CancellationToken::new();

    let (tx, rx) = mpsc::channel(READING_CHANNEL_CAPACITY);
    let sink: Sink = Arc::new(move |heart_rate: Measurement| {
        // Never wait on a slow consumer from the notification path.
        if let Err(err) = tx.try_send(heart_rate) {
            warn!("Dropped reading {heart_rate}: {err}");
        }
    });
    spawn(report_readings(rx));

    let supervisor = if simulate {
        info!("Running against a simulated sensor");
        let radio = SimulatedRadio::new(config.device_name_filter.clone());
        spawn_supervisor(radio, config, cancel.clone(), sink)
    } else {
        spawn_supervisor(BtleRadio::new(), config, cancel.clone(), sink)
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    cancel.cancel();
    supervisor.await?;

    Ok(())
}

fn spawn_supervisor<R: Radio + 'static>(
    radio: R,
    config: SupervisorConfig,
    cancel: CancellationToken,
    sink: Sink,
) -> JoinHandle<()> {
    spawn(async move {
        Supervisor::new(radio, config, cancel).run(sink).await;
    })
}

/// Running figures over everything received so far. Lives on the consumer side
/// of the channel; the link code only ever hands out raw readings.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ReadingStats {
    current: Measurement,
    min: Option<Measurement>,
    max: Option<Measurement>,
}

impl ReadingStats {
    fn update(&mut self, heart_rate: Measurement) {
        self.current = heart_rate;
        self.min = Some(self.min.map_or(heart_rate, |min| min.min(heart_rate)));
        self.max = Some(self.max.map_or(heart_rate, |max| max.max(heart_rate)));
    }
}

async fn report_readings(mut rx_from_link: TokioReceiver<Measurement>) {
    let mut stats = ReadingStats::default();
    while let Some(heart_rate) = rx_from_link.recv().await {
        stats.update(heart_rate);
        info!(
            "HR: {} (min {}, max {})",
            stats.current,
            stats.min.unwrap_or(heart_rate),
            stats.max.unwrap_or(heart_rate)
        );
    }
}
