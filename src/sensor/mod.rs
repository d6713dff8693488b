//! Sensor backends and the poll loop.
//!
//! Exactly one backend is active per process lifetime: a DHT-family digital
//! sensor on a GPIO pin, or the Enviro pHAT environmental board on I2C.
//! Both produce the same normalized [`Reading`] once per cycle.

pub mod config;
pub mod dht;
pub mod envirophat;
pub mod humidity;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::RoomMetrics;

pub use config::{BackendKind, DhtModel, SensorConfig};
pub use dht::DhtReader;
pub use envirophat::EnvirophatReader;
pub use humidity::calculate_absolute_humidity;

/// One cycle's worth of sensor values.
///
/// Each field is either fully populated or absent for the whole cycle; which
/// fields can be present at all is fixed by the backend that produced the
/// reading. A `Reading` has no identity beyond the cycle: it is folded into
/// the gauge set and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Reading {
    /// Temperature in degrees Celsius
    pub temperature: Option<f64>,
    /// Relative humidity in percent (DHT backends only)
    pub relative_humidity: Option<f64>,
    /// Absolute humidity in g/m^3, derived from the two fields above
    pub absolute_humidity: Option<f64>,
    /// Raw light level (Enviro pHAT only)
    pub brightness: Option<f64>,
    /// Barometric pressure in pascals (Enviro pHAT only)
    pub pressure: Option<f64>,
}

impl Reading {
    /// A reading with every field absent, produced when a DHT read cycle
    /// exhausts its retry budget.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Whether any field is populated.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A sensor backend: produces one [`Reading`] per poll cycle.
///
/// The DHT implementation signals failure through absence and never returns
/// an error; the Enviro pHAT implementation treats any hardware fault as
/// fatal and propagates it.
pub trait SensorReader: Send {
    /// The backend kind, used to decide which gauges exist.
    fn backend(&self) -> BackendKind;

    /// Take one reading. May block for the backend's own retry budget.
    fn read_cycle(&mut self) -> Result<Reading>;
}

/// Construct the reader selected by the startup configuration.
pub fn build_reader(config: SensorConfig) -> Result<Box<dyn SensorReader>> {
    match config {
        SensorConfig::Dht { model, pin } => Ok(Box::new(DhtReader::new(model, pin))),
        SensorConfig::Envirophat { temperature_offset } => {
            Ok(Box::new(EnvirophatReader::new(temperature_offset)?))
        }
    }
}

/// Run the read → derive → publish → sleep cycle until shutdown.
///
/// The interval is raced against the shutdown channel, so an interrupt is
/// observed between cycles, never mid-read. A read error (Enviro pHAT
/// hardware fault) propagates and terminates the process.
pub async fn run_poll_loop(
    mut reader: Box<dyn SensorReader>,
    metrics: Arc<RoomMetrics>,
    mut shutdown: watch::Receiver<bool>,
    poll_interval: Duration,
) -> Result<()> {
    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let reading = reader.read_cycle()?;
                debug!(?reading, "cycle complete");
                metrics.publish(&reading);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("Poll loop stopping");
                    return Ok(());
                }
            }
        }
    }
}
