use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::info;
use rand::Rng;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::transport::{Link, NotificationHandler, PeripheralRef, Radio};

const NOTIFY_INTERVAL: Duration = Duration::from_millis(800);

/// A pretend sensor for running without Bluetooth hardware. It always shows up
/// in scans under `name`, sends 50-70 bpm readings, and drops the connection
/// after a random number of them so reconnects get exercised too.
pub struct SimulatedRadio {
    name: String,
}

impl SimulatedRadio {
    pub fn new(name: impl Into<String>) -> Self {
        SimulatedRadio { name: name.into() }
    }
}

#[async_trait]
impl Radio for SimulatedRadio {
    type Link = SimulatedLink;

    async fn scan(&self, timeout: Duration) -> Result<Vec<PeripheralRef>> {
        tokio::time::sleep(timeout.min(Duration::from_millis(500))).await;
        Ok(vec![PeripheralRef::new("00:00:00:00:48:52", self.name.clone())])
    }

    async fn connect(&self, peripheral: &PeripheralRef) -> Result<SimulatedLink> {
        info!("Simulating connection to {peripheral}");
        Ok(SimulatedLink {
            connected: Arc::new(AtomicBool::new(true)),
            task: None,
        })
    }
}

pub struct SimulatedLink {
    connected: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl Link for SimulatedLink {
    async fn subscribe(&mut self, handler: NotificationHandler) -> Result<()> {
        let readings = rand::thread_rng().gen_range(10..40);
        let connected = self.connected.clone();

        self.task = Some(tokio::spawn(async move {
            for _ in 0..readings {
                tokio::time::sleep(NOTIFY_INTERVAL).await;
                let heart_rate: u8 = rand::thread_rng().gen_range(50..70);
                handler(&[0x00, heart_rate][..]);
            }
            info!("Simulated sensor went out of range after {readings} readings");
            connected.store(false, Ordering::Release);
        }));
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.connected.load(Ordering::Acquire))
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}
