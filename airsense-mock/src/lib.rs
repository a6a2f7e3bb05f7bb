use std::error::Error;
use std::time::Duration;

use airsense_embedded::{BASELINE_RECORD_LEN, CalibrationConfig, NodeConfig, SensorNode};
use tokio::time;
use tracing::info;

use crate::serial::StdioSerial;
use crate::settings::Settings;
use crate::simulate::{ScaledClock, SimulatedClimate, SimulatedIaqSensor, SimulatedLight};
use crate::storage::FileStorage;

mod serial;
pub mod settings;
mod simulate;
mod storage;

/// Main loop period in real time
const POLL_PERIOD: Duration = Duration::from_millis(10);

pub async fn run(settings: &Settings) -> Result<(), Box<dyn Error>> {
    let clock = ScaledClock::new(settings.node.time_scale);
    let storage = FileStorage::open(&settings.node.storage_path, BASELINE_RECORD_LEN)?;
    let config = NodeConfig {
        node_id: settings.node.node_id,
        report_interval_ms: settings.node.report_interval_ms,
        calibration: CalibrationConfig::default(),
    };

    let mut node = SensorNode::new(
        SimulatedIaqSensor::new(clock.clone())?,
        storage,
        SimulatedClimate::new(clock.clone())?,
        SimulatedLight::new(clock.clone()),
        StdioSerial::spawn(),
        clock,
        config,
    );

    node.begin()?;
    info!(
        "Node {} running, baseline stored at {}",
        config.node_id, settings.node.storage_path
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut interval = time::interval(POLL_PERIOD);
    loop {
        tokio::select! {
            _ = interval.tick() => node.poll(),
            _ = &mut shutdown => {
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}
