//! # room-exporter
//!
//! Collects DHT / Enviro pHAT environmental sensor readings on a Raspberry
//! Pi and exports them as Prometheus gauges, labeled by room.
//!
//! One sensor backend is selected at startup: a DHT-family digital sensor on
//! a GPIO pin, or the Enviro pHAT environmental board on I2C. A fixed
//! 10-second poll loop reads the sensor, derives absolute humidity where
//! possible, and updates the gauge set that the `/metrics` endpoint serves.
//!
//! Hardware access is gated behind the `hardware` cargo feature so the crate
//! builds and tests on non-Pi hosts; without it the DHT backend reports
//! absent readings and the Enviro pHAT backend refuses to start.

pub mod error;
pub mod metrics;
pub mod sensor;
pub mod web;

// Re-export public API
pub use error::{ExporterError, Result};
pub use metrics::RoomMetrics;
pub use sensor::{
    build_reader, calculate_absolute_humidity, run_poll_loop, BackendKind, DhtModel, Reading,
    SensorConfig, SensorReader,
};
pub use web::WebConfig;

/// Seconds between poll cycles.
pub const POLL_INTERVAL_SECS: u64 = 10;

/// The default port for the metrics endpoint.
pub const DEFAULT_LISTEN_PORT: u16 = 1337;

/// The room label used when none is configured.
pub const DEFAULT_ROOM: &str = "unset";
