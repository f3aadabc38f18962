use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use btleplug::api::{
    Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral as PlatformPeripheral};

use crate::error::{LinkError, Result};
use crate::frame::HEART_RATE_MEASUREMENT_UUID;
use crate::transport::{Link, NotificationHandler, PeripheralRef, Radio};


/// The host's first Bluetooth adapter, driven through btleplug.
///
/// The adapter is looked up on first use and again after every failed lookup,
/// so a missing or unpowered adapter only fails individual scans.
pub struct BtleRadio {
    adapter: OnceCell<Adapter>,
}

impl Default for BtleRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl BtleRadio {
    pub fn new() -> Self {
        BtleRadio {
            adapter: OnceCell::new(),
        }
    }

    async fn adapter(&self) -> Result<&Adapter> {
        self.adapter.get_or_try_init(open_first_adapter).await
    }

    async fn find_peripheral(&self, peripheral: &PeripheralRef) -> Result<PlatformPeripheral> {
        // The list may still hold peripherals that have gone away since the scan,
        // connecting to them fails later and is reported as such.
        self.adapter()
            .await?
            .peripherals()
            .await?
            .into_iter()
            .find(|p| peripheral_id(p) == peripheral.id)
            .ok_or_else(|| LinkError::UnknownPeripheral(peripheral.id.clone()))
    }
}

async fn open_first_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapter_list = manager.adapters().await?;

    for adapter in adapter_list.iter() {
        let info = adapter.adapter_info().await.unwrap_or("No name adapter".to_string());
        debug!("Bluetooth adapter: {info}");
    }

    // TODO: let the config pick an adapter when more than one is present
    adapter_list.into_iter().next().ok_or(LinkError::NoAdapter)
}

#[async_trait]
impl Radio for BtleRadio {
    type Link = BtleLink;

    async fn scan(&self, timeout: Duration) -> Result<Vec<PeripheralRef>> {
        let adapter = self.adapter().await?;
        adapter.start_scan(ScanFilter::default()).await?;
        tokio::time::sleep(timeout).await;

        if let Err(err) = adapter.stop_scan().await {
            warn!("Failed to stop scan: {err}");
        }

        let mut found = vec![];
        for peripheral in adapter.peripherals().await? {
            let Ok(Some(properties)) = peripheral.properties().await else { continue; };
            let Some(name) = properties.local_name else { continue; };
            found.push(PeripheralRef::new(peripheral_id(&peripheral), name));
        }

        Ok(found)
    }

    async fn connect(&self, target: &PeripheralRef) -> Result<BtleLink> {
        let peripheral = self.find_peripheral(target).await?;

        if !peripheral.is_connected().await? {
            info!("Connecting to {target}...");
            peripheral.connect().await?;
        }

        let setup = async {
            debug!("Discovering services of {}...", target.name);
            peripheral.discover_services().await?;

            peripheral
                .characteristics()
                .into_iter()
                .find(|c| {
                    c.uuid == HEART_RATE_MEASUREMENT_UUID
                        && c.properties.contains(CharPropFlags::NOTIFY)
                })
                .ok_or(LinkError::CharacteristicNotFound(HEART_RATE_MEASUREMENT_UUID))
        };
        let disconnect = async { peripheral.disconnect().await.map_err(LinkError::from) };
        let characteristic = disconnect_on_error(target, setup, disconnect).await?;

        Ok(BtleLink {
            peripheral,
            characteristic,
            notify_task: None,
        })
    }
}

/// Runs the post-connect `setup`. If it fails, `disconnect` runs before the
/// error is returned so no half-open connection is left behind.
async fn disconnect_on_error<T>(
    target: &PeripheralRef,
    setup: impl Future<Output = Result<T>>,
    disconnect: impl Future<Output = Result<()>>,
) -> Result<T> {
    match setup.await {
        Ok(value) => Ok(value),
        Err(err) => {
            if let Err(disconnect_err) = disconnect.await {
                warn!("Failed to disconnect from {target}: {disconnect_err}");
            }
            Err(err)
        }
    }
}

pub struct BtleLink {
    peripheral: PlatformPeripheral,
    characteristic: Characteristic,
    notify_task: Option<JoinHandle<()>>,
}

impl BtleLink {
    fn stop_notify_task(&mut self) {
        if let Some(task) = self.notify_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Link for BtleLink {
    async fn subscribe(&mut self, handler: NotificationHandler) -> Result<()> {
        let mut notifications = self.peripheral.notifications().await?;

        debug!("Subscribing to characteristic {:?}", self.characteristic.uuid);
        self.peripheral.subscribe(&self.characteristic).await?;

        self.notify_task = Some(tokio::spawn(async move {
            // Ends by itself when the connection goes away and btleplug closes the stream.
            while let Some(data) = notifications.next().await {
                if data.uuid == HEART_RATE_MEASUREMENT_UUID {
                    handler(data.value.as_slice());
                }
            }
            debug!("Notification stream closed");
        }));

        Ok(())
    }

    async fn is_connected(&self) -> Result<bool> {
        Ok(self.peripheral.is_connected().await?)
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.stop_notify_task();
        self.peripheral.unsubscribe(&self.characteristic).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.stop_notify_task();
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

impl Drop for BtleLink {
    fn drop(&mut self) {
        self.stop_notify_task();
    }
}

fn peripheral_id(peripheral: &PlatformPeripheral) -> String {
    format!("{:?}", peripheral.id())
}
