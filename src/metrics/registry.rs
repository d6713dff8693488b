//! The gauge registry updated by the poll loop and scraped over HTTP.
//!
//! One labeled gauge per measurable quantity, all sharing a single `room`
//! label. Which gauges exist depends on the selected backend: the Enviro
//! pHAT has no humidity sensor, and a DHT has no light or pressure sensor,
//! so the unused gauges are never registered. Gauge storage is atomic; the
//! scrape handler reads concurrently with the poll loop without extra
//! locking.

use std::sync::atomic::AtomicU64;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use crate::error::{ExporterError, Result};
use crate::sensor::{BackendKind, Reading};

/// The single label dimension shared by every gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RoomLabels {
    room: String,
}

type RoomGauge = Family<RoomLabels, Gauge<f64, AtomicU64>>;

/// Owned metrics registry, constructed once at startup.
///
/// Updates follow last-value-wins semantics: a value absent from a cycle
/// leaves the previous gauge value untouched.
pub struct RoomMetrics {
    registry: Registry,
    labels: RoomLabels,
    temperature: RoomGauge,
    relative_humidity: Option<RoomGauge>,
    absolute_humidity: Option<RoomGauge>,
    brightness: Option<RoomGauge>,
    pressure: Option<RoomGauge>,
}

impl RoomMetrics {
    /// Build the registry for the selected backend and room label.
    pub fn new(backend: BackendKind, room: impl Into<String>) -> Self {
        let mut registry = Registry::default();

        let temperature = RoomGauge::default();
        registry.register(
            "room_temperature",
            "Current room temperature (deg C)",
            temperature.clone(),
        );

        let mut relative_humidity = None;
        let mut absolute_humidity = None;
        let mut brightness = None;
        let mut pressure = None;

        match backend {
            BackendKind::Dht => {
                let gauge = RoomGauge::default();
                registry.register(
                    "room_relative_humidity",
                    "Current room relative humidity (%)",
                    gauge.clone(),
                );
                relative_humidity = Some(gauge);

                let gauge = RoomGauge::default();
                registry.register(
                    "room_absolute_humidity",
                    "Current room absolute humidity (g/m^3)",
                    gauge.clone(),
                );
                absolute_humidity = Some(gauge);
            }
            BackendKind::Envirophat => {
                let gauge = RoomGauge::default();
                registry.register(
                    "room_brightness",
                    "Current room brightness (counts)",
                    gauge.clone(),
                );
                brightness = Some(gauge);

                let gauge = RoomGauge::default();
                registry.register(
                    "room_pressure",
                    "Current room pressure (Pa)",
                    gauge.clone(),
                );
                pressure = Some(gauge);
            }
        }

        Self {
            registry,
            labels: RoomLabels { room: room.into() },
            temperature,
            relative_humidity,
            absolute_humidity,
            brightness,
            pressure,
        }
    }

    /// Fold one reading into the gauge set.
    ///
    /// Only present values touch a gauge, and only gauges the backend
    /// registered can be touched. Values are rounded to their presentation
    /// precision before storage.
    pub fn publish(&self, reading: &Reading) {
        if let Some(value) = reading.temperature {
            self.temperature
                .get_or_create(&self.labels)
                .set(round_to(value, 1));
        }
        if let (Some(value), Some(gauge)) = (reading.relative_humidity, &self.relative_humidity) {
            gauge.get_or_create(&self.labels).set(round_to(value, 1));
        }
        if let (Some(value), Some(gauge)) = (reading.absolute_humidity, &self.absolute_humidity) {
            gauge.get_or_create(&self.labels).set(round_to(value, 2));
        }
        if let (Some(value), Some(gauge)) = (reading.brightness, &self.brightness) {
            gauge.get_or_create(&self.labels).set(round_to(value, 2));
        }
        if let (Some(value), Some(gauge)) = (reading.pressure, &self.pressure) {
            gauge.get_or_create(&self.labels).set(round_to(value, 2));
        }
    }

    /// Encode the registry in OpenMetrics text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)
            .map_err(|e| ExporterError::metrics_error(e.to_string()))?;
        Ok(buffer)
    }
}

/// Round to a fixed number of decimal places, matching `{:.N}` formatting.
fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}
