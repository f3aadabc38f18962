use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{LinkError, Result};
use crate::transport::{PeripheralRef, Radio};

/// Pause between unsuccessful scans. Capped at half the scan timeout so it
/// always stays shorter than a scan.
const SCAN_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Scans up to `max_attempts` times for a peripheral whose advertised name
/// contains `filter`. The first match wins; scan errors count as a failed attempt.
pub async fn locate<R: Radio>(
    radio: &R,
    filter: &str,
    scan_timeout: Duration,
    max_attempts: u32,
) -> Result<PeripheralRef> {
    let pause = SCAN_RETRY_PAUSE.min(scan_timeout / 2);

    for attempt in 1..=max_attempts {
        debug!("Scan attempt {attempt}/{max_attempts} for {filter:?}");

        match radio.scan(scan_timeout).await {
            Ok(peripherals) => {
                if let Some(found) = peripherals.into_iter().find(|p| p.name.contains(filter)) {
                    info!("Found matching peripheral {found} on attempt {attempt}");
                    return Ok(found);
                }
            }
            Err(err) => warn!("Scan attempt {attempt} failed: {err}"),
        }

        if attempt < max_attempts {
            tokio::time::sleep(pause).await;
        }
    }

    Err(LinkError::NotFound {
        filter: filter.to_string(),
        attempts: max_attempts,
    })
}
