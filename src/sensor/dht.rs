//! DHT-family digital sensor backend (DHT11, DHT22, AM2302).
//!
//! The sensor speaks a single-wire protocol on one GPIO pin: the host holds
//! the line low to request a reading, then the sensor answers with 40 bits
//! encoded as pulse widths, followed by a one-byte checksum. Reads fail
//! often (the timing window is tight), so every cycle runs a retry budget
//! and exhaustion is reported as an all-absent reading rather than an error.
//!
//! Hardware access is compiled in with the `hardware` feature; without it
//! the backend always yields absence, which keeps the crate buildable and
//! testable on non-Pi hosts.

use tracing::warn;

use crate::error::Result;
use crate::sensor::config::{BackendKind, DhtModel};
use crate::sensor::humidity::calculate_absolute_humidity;
use crate::sensor::{Reading, SensorReader};

/// Retry budget matching the Adafruit `read_retry` defaults.
#[cfg(feature = "hardware")]
const READ_ATTEMPTS: u32 = 15;
#[cfg(feature = "hardware")]
const RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

/// GPIO-attached DHT sensor.
pub struct DhtReader {
    model: DhtModel,
    pin: u8,
    warned_unavailable: bool,
}

impl DhtReader {
    pub fn new(model: DhtModel, pin: u8) -> Self {
        Self {
            model,
            pin,
            warned_unavailable: false,
        }
    }

    /// Read temperature and relative humidity, retrying on failure.
    ///
    /// Blocks for up to `READ_ATTEMPTS * RETRY_DELAY`; `None` means the
    /// budget was exhausted and this cycle has no values.
    #[cfg(feature = "hardware")]
    fn read_with_retry(&mut self) -> Option<(f64, f64)> {
        for attempt in 1..=READ_ATTEMPTS {
            match hardware::read_frame(self.pin, self.model) {
                Some(frame) => {
                    if let Some(values) = decode_frame(self.model, frame) {
                        return Some(values);
                    }
                    tracing::debug!(attempt, "DHT frame failed checksum");
                }
                None => tracing::debug!(attempt, "DHT read timed out"),
            }
            if attempt < READ_ATTEMPTS {
                std::thread::sleep(RETRY_DELAY);
            }
        }
        if !self.warned_unavailable {
            warn!(
                model = %self.model,
                pin = self.pin,
                "DHT retries exhausted, reading skipped (will warn once)"
            );
            self.warned_unavailable = true;
        }
        None
    }

    #[cfg(not(feature = "hardware"))]
    fn read_with_retry(&mut self) -> Option<(f64, f64)> {
        if !self.warned_unavailable {
            warn!(
                model = %self.model,
                pin = self.pin,
                "built without the hardware feature, DHT readings will be absent"
            );
            self.warned_unavailable = true;
        }
        None
    }
}

impl SensorReader for DhtReader {
    fn backend(&self) -> BackendKind {
        BackendKind::Dht
    }

    fn read_cycle(&mut self) -> Result<Reading> {
        let mut reading = Reading::absent();
        if let Some((temperature, relative_humidity)) = self.read_with_retry() {
            reading.temperature = Some(temperature);
            reading.relative_humidity = Some(relative_humidity);
            reading.absolute_humidity =
                Some(calculate_absolute_humidity(relative_humidity, temperature));
        }
        Ok(reading)
    }
}

/// Decode a 5-byte sensor frame into `(temperature, relative_humidity)`.
///
/// Byte 4 is the truncated sum of bytes 0..=3. The DHT11 reports whole
/// degrees and percent in bytes 2 and 0; the DHT22/AM2302 report tenths in
/// 16-bit fields, with the temperature sign carried in the top bit.
#[cfg_attr(not(feature = "hardware"), allow(dead_code))]
fn decode_frame(model: DhtModel, frame: [u8; 5]) -> Option<(f64, f64)> {
    let checksum = frame[0]
        .wrapping_add(frame[1])
        .wrapping_add(frame[2])
        .wrapping_add(frame[3]);
    if checksum != frame[4] {
        return None;
    }

    match model {
        DhtModel::Dht11 => Some((frame[2] as f64, frame[0] as f64)),
        DhtModel::Dht22 | DhtModel::Am2302 => {
            let relative_humidity = u16::from_be_bytes([frame[0], frame[1]]) as f64 / 10.0;
            let magnitude = u16::from_be_bytes([frame[2] & 0x7f, frame[3]]) as f64 / 10.0;
            let temperature = if frame[2] & 0x80 != 0 {
                -magnitude
            } else {
                magnitude
            };
            Some((temperature, relative_humidity))
        }
    }
}

#[cfg(feature = "hardware")]
mod hardware {
    //! Bit-banged wire protocol over rppal.

    use std::time::{Duration, Instant};

    use rppal::gpio::{Gpio, IoPin, Level, Mode};

    use crate::sensor::config::DhtModel;

    /// Read one raw 40-bit frame plus checksum. `None` on any timing or
    /// GPIO failure; the caller retries.
    pub fn read_frame(pin: u8, model: DhtModel) -> Option<[u8; 5]> {
        let gpio = Gpio::new().ok()?;
        let mut pin = gpio.get(pin).ok()?.into_io(Mode::Output);

        // Host start signal: idle high, then hold the line low long enough
        // for the sensor to notice (18 ms for the DHT11, ~1.1 ms for the
        // DHT22/AM2302), then release.
        pin.set_high();
        std::thread::sleep(Duration::from_millis(1));
        pin.set_low();
        let start_low = match model {
            DhtModel::Dht11 => Duration::from_millis(18),
            DhtModel::Dht22 | DhtModel::Am2302 => Duration::from_micros(1100),
        };
        std::thread::sleep(start_low);
        pin.set_mode(Mode::Input);

        // Sensor response: ~80 us low, ~80 us high, then data.
        wait_for(&pin, Level::Low, Duration::from_micros(200))?;
        wait_for(&pin, Level::High, Duration::from_micros(200))?;
        wait_for(&pin, Level::Low, Duration::from_micros(200))?;

        // 40 bits, each a ~50 us low separator followed by a high pulse:
        // ~28 us means 0, ~70 us means 1.
        let mut frame = [0u8; 5];
        for bit in 0..40 {
            wait_for(&pin, Level::High, Duration::from_micros(150))?;
            let width = pulse_width(&pin, Level::High, Duration::from_micros(150))?;
            if width > Duration::from_micros(48) {
                frame[bit / 8] |= 1 << (7 - bit % 8);
            }
        }

        Some(frame)
    }

    /// Busy-wait until the line reads `level`, within `timeout`.
    fn wait_for(pin: &IoPin, level: Level, timeout: Duration) -> Option<()> {
        let start = Instant::now();
        while pin.read() != level {
            if start.elapsed() > timeout {
                return None;
            }
        }
        Some(())
    }

    /// Busy-wait while the line stays at `level`, returning how long it did.
    fn pulse_width(pin: &IoPin, level: Level, timeout: Duration) -> Option<Duration> {
        let start = Instant::now();
        while pin.read() == level {
            if start.elapsed() > timeout {
                return None;
            }
        }
        Some(start.elapsed())
    }
}
