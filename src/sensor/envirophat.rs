//! Enviro pHAT environmental board backend.
//!
//! The board stacks a BMP280 (temperature + pressure) and a TCS3472 light
//! sensor on the Pi's I2C bus. It has no humidity sensor. Because the board
//! sits directly on the Pi, the BMP280 picks up heat from the CPU; a fixed
//! configured offset is subtracted from every temperature reading.
//! TODO make the offset intelligent
//!
//! Unlike the DHT path, any hardware-access failure here is fatal: a wiring
//! or bus fault needs an operator, not a retry.

use crate::error::Result;
use crate::sensor::config::BackendKind;
use crate::sensor::{Reading, SensorReader};

/// One raw sample from the board, before offset compensation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardSample {
    /// Compensated BMP280 temperature in degrees Celsius
    pub temperature: f64,
    /// TCS3472 clear-channel count
    pub brightness: f64,
    /// Compensated BMP280 pressure in pascals
    pub pressure: f64,
}

/// Convert a raw board sample into a reading.
///
/// The temperature offset compensates for CPU heat bleed into the board.
pub fn reading_from_sample(sample: BoardSample, temperature_offset: f64) -> Reading {
    Reading {
        temperature: Some(sample.temperature - temperature_offset),
        brightness: Some(sample.brightness),
        pressure: Some(sample.pressure),
        ..Reading::default()
    }
}

/// Onboard Enviro pHAT reader.
pub struct EnvirophatReader {
    #[cfg_attr(not(feature = "hardware"), allow(dead_code))]
    temperature_offset: f64,
    #[cfg(feature = "hardware")]
    bus: hardware::Bus,
}

impl EnvirophatReader {
    /// Open the I2C bus and initialize both sensors.
    ///
    /// Fails if the board (or hardware support itself) is unavailable, which
    /// terminates startup.
    #[cfg(feature = "hardware")]
    pub fn new(temperature_offset: i64) -> Result<Self> {
        Ok(Self {
            temperature_offset: temperature_offset as f64,
            bus: hardware::Bus::open()?,
        })
    }

    #[cfg(not(feature = "hardware"))]
    pub fn new(_temperature_offset: i64) -> Result<Self> {
        Err(crate::error::ExporterError::hardware_error(
            "built without the hardware feature, Enviro pHAT unavailable",
        ))
    }
}

impl SensorReader for EnvirophatReader {
    fn backend(&self) -> BackendKind {
        BackendKind::Envirophat
    }

    #[cfg(feature = "hardware")]
    fn read_cycle(&mut self) -> Result<Reading> {
        let sample = self.bus.sample()?;
        Ok(reading_from_sample(sample, self.temperature_offset))
    }

    #[cfg(not(feature = "hardware"))]
    fn read_cycle(&mut self) -> Result<Reading> {
        Err(crate::error::ExporterError::hardware_error(
            "Enviro pHAT unavailable",
        ))
    }
}

/// BMP280 calibration block, read once from the sensor's NVM at startup.
#[derive(Debug, Clone, Copy)]
pub struct Bmp280Calibration {
    dig_t1: u16,
    dig_t2: i16,
    dig_t3: i16,
    dig_p1: u16,
    dig_p2: i16,
    dig_p3: i16,
    dig_p4: i16,
    dig_p5: i16,
    dig_p6: i16,
    dig_p7: i16,
    dig_p8: i16,
    dig_p9: i16,
}

impl Bmp280Calibration {
    /// Parse the 24-byte little-endian calibration block at register 0x88.
    pub fn from_bytes(raw: [u8; 24]) -> Self {
        let u = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
        let s = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]);
        Self {
            dig_t1: u(0),
            dig_t2: s(2),
            dig_t3: s(4),
            dig_p1: u(6),
            dig_p2: s(8),
            dig_p3: s(10),
            dig_p4: s(12),
            dig_p5: s(14),
            dig_p6: s(16),
            dig_p7: s(18),
            dig_p8: s(20),
            dig_p9: s(22),
        }
    }

    /// Datasheet 32-bit temperature compensation.
    ///
    /// Returns the temperature in degrees Celsius and the `t_fine` carrier
    /// needed by the pressure compensation.
    pub fn compensate_temperature(&self, adc_t: i32) -> (f64, i32) {
        let var1 = (((adc_t >> 3) - ((self.dig_t1 as i32) << 1)) * self.dig_t2 as i32) >> 11;
        let var2 = (((((adc_t >> 4) - self.dig_t1 as i32) * ((adc_t >> 4) - self.dig_t1 as i32))
            >> 12)
            * self.dig_t3 as i32)
            >> 14;
        let t_fine = var1 + var2;
        let temperature = ((t_fine * 5 + 128) >> 8) as f64 / 100.0;
        (temperature, t_fine)
    }

    /// Datasheet 64-bit pressure compensation, in pascals.
    pub fn compensate_pressure(&self, adc_p: i32, t_fine: i32) -> f64 {
        let mut var1 = t_fine as i64 - 128000;
        let mut var2 = var1 * var1 * self.dig_p6 as i64;
        var2 += (var1 * self.dig_p5 as i64) << 17;
        var2 += (self.dig_p4 as i64) << 35;
        var1 = ((var1 * var1 * self.dig_p3 as i64) >> 8) + ((var1 * self.dig_p2 as i64) << 12);
        var1 = (((1i64 << 47) + var1) * self.dig_p1 as i64) >> 33;
        if var1 == 0 {
            // Avoid dividing by zero with a blank calibration block
            return 0.0;
        }
        let mut p = 1048576 - adc_p as i64;
        p = (((p << 31) - var2) * 3125) / var1;
        let var1 = (self.dig_p9 as i64 * (p >> 13) * (p >> 13)) >> 25;
        let var2 = (self.dig_p8 as i64 * p) >> 19;
        p = ((p + var1 + var2) >> 8) + ((self.dig_p7 as i64) << 4);
        p as f64 / 256.0
    }
}

#[cfg(feature = "hardware")]
mod hardware {
    //! I2C access to the BMP280 and TCS3472 over rppal.

    use rppal::i2c::I2c;

    use super::{Bmp280Calibration, BoardSample};
    use crate::error::Result;

    const BMP280_ADDR: u16 = 0x77;
    const BMP280_REG_CALIB: u8 = 0x88;
    const BMP280_REG_CTRL_MEAS: u8 = 0xf4;
    const BMP280_REG_CONFIG: u8 = 0xf5;
    const BMP280_REG_PRESS_MSB: u8 = 0xf7;
    // Normal mode, x1 oversampling for temperature and pressure
    const BMP280_MODE_NORMAL_X1: u8 = 0x27;

    const TCS3472_ADDR: u16 = 0x29;
    const TCS3472_CMD_AUTO_INC: u8 = 0xa0;
    const TCS3472_REG_ENABLE: u8 = 0x00;
    const TCS3472_REG_CDATAL: u8 = 0x14;
    // Power on + ADC enable
    const TCS3472_PON_AEN: u8 = 0x03;

    pub struct Bus {
        i2c: I2c,
        calibration: Bmp280Calibration,
    }

    impl Bus {
        /// Open the bus, read the BMP280 calibration and enable both sensors.
        pub fn open() -> Result<Self> {
            let mut i2c = I2c::new()?;

            i2c.set_slave_address(BMP280_ADDR)?;
            let mut raw = [0u8; 24];
            i2c.write_read(&[BMP280_REG_CALIB], &mut raw)?;
            let calibration = Bmp280Calibration::from_bytes(raw);
            i2c.write(&[BMP280_REG_CTRL_MEAS, BMP280_MODE_NORMAL_X1])?;
            i2c.write(&[BMP280_REG_CONFIG, 0x00])?;

            i2c.set_slave_address(TCS3472_ADDR)?;
            i2c.write(&[
                TCS3472_CMD_AUTO_INC | TCS3472_REG_ENABLE,
                TCS3472_PON_AEN,
            ])?;

            Ok(Self { i2c, calibration })
        }

        /// Take one sample from both sensors.
        pub fn sample(&mut self) -> Result<BoardSample> {
            self.i2c.set_slave_address(BMP280_ADDR)?;
            let mut data = [0u8; 6];
            self.i2c.write_read(&[BMP280_REG_PRESS_MSB], &mut data)?;
            let adc_p =
                ((data[0] as i32) << 12) | ((data[1] as i32) << 4) | ((data[2] as i32) >> 4);
            let adc_t =
                ((data[3] as i32) << 12) | ((data[4] as i32) << 4) | ((data[5] as i32) >> 4);
            let (temperature, t_fine) = self.calibration.compensate_temperature(adc_t);
            let pressure = self.calibration.compensate_pressure(adc_p, t_fine);

            self.i2c.set_slave_address(TCS3472_ADDR)?;
            let mut clear = [0u8; 2];
            self.i2c
                .write_read(&[TCS3472_CMD_AUTO_INC | TCS3472_REG_CDATAL], &mut clear)?;
            let brightness = u16::from_le_bytes(clear) as f64;

            Ok(BoardSample {
                temperature,
                brightness,
                pressure,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Worked example from the BMP280 datasheet.
    fn datasheet_calibration() -> Bmp280Calibration {
        let mut raw = [0u8; 24];
        let words: [(usize, u16); 12] = [
            (0, 27504),
            (2, 26435),
            (4, (-1000i16) as u16),
            (6, 36477),
            (8, (-10685i16) as u16),
            (10, 3024),
            (12, 2855),
            (14, 140),
            (16, (-7i16) as u16),
            (18, 15500),
            (20, (-14600i16) as u16),
            (22, 6000),
        ];
        for (offset, word) in words {
            raw[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
        }
        Bmp280Calibration::from_bytes(raw)
    }

    #[test]
    fn test_bmp280_temperature_compensation() {
        let calibration = datasheet_calibration();
        let (temperature, t_fine) = calibration.compensate_temperature(519888);
        assert_eq!(temperature, 25.08);
        assert_eq!(t_fine, 128422);
    }

    #[test]
    fn test_bmp280_pressure_compensation() {
        let calibration = datasheet_calibration();
        let (_, t_fine) = calibration.compensate_temperature(519888);
        let pressure = calibration.compensate_pressure(415148, t_fine);
        assert!((pressure - 100653.25).abs() < 0.01, "got {}", pressure);
    }

    #[test]
    fn test_blank_calibration_yields_zero_pressure() {
        let calibration = Bmp280Calibration::from_bytes([0u8; 24]);
        let pressure = calibration.compensate_pressure(415148, 128422);
        assert_eq!(pressure, 0.0);
    }

    #[test]
    fn test_reading_applies_temperature_offset() {
        let sample = BoardSample {
            temperature: 28.0,
            brightness: 812.0,
            pressure: 100653.25,
        };
        let reading = reading_from_sample(sample, 3.0);
        assert_eq!(reading.temperature, Some(25.0));
        assert_eq!(reading.brightness, Some(812.0));
        assert_eq!(reading.pressure, Some(100653.25));
    }

    #[test]
    fn test_reading_preserves_backend_mask() {
        let sample = BoardSample {
            temperature: 21.5,
            brightness: 40.0,
            pressure: 99870.0,
        };
        let reading = reading_from_sample(sample, 0.0);
        assert!(reading.relative_humidity.is_none());
        assert!(reading.absolute_humidity.is_none());
    }
}
