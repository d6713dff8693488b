//! Startup sensor configuration and validation.
//!
//! The connection type and DHT model arrive as plain strings so that an
//! unrecognized value can be rejected with exit status 1 instead of clap's
//! usage error. All validation happens here, before any hardware or network
//! resource is touched.

use std::fmt;
use std::str::FromStr;

/// Which sensor backend is attached to this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// GPIO-attached DHT-family digital sensor
    Dht,
    /// Onboard Enviro pHAT environmental board
    Envirophat,
}

/// DHT sensor model, selected with `--sensor-version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtModel {
    Dht11,
    Dht22,
    Am2302,
}

impl FromStr for DhtModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "11" => Ok(Self::Dht11),
            "22" => Ok(Self::Dht22),
            "2302" => Ok(Self::Am2302),
            other => Err(ConfigError::InvalidVersion(other.to_string())),
        }
    }
}

impl fmt::Display for DhtModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dht11 => write!(f, "DHT11"),
            Self::Dht22 => write!(f, "DHT22"),
            Self::Am2302 => write!(f, "AM2302"),
        }
    }
}

/// Resolved, validated sensor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorConfig {
    /// DHT-family sensor on a GPIO pin
    Dht { model: DhtModel, pin: u8 },
    /// Enviro pHAT with a fixed temperature offset in whole degrees
    Envirophat { temperature_offset: i64 },
}

impl SensorConfig {
    /// Resolve the raw flag values into a sensor configuration.
    ///
    /// Errors here are configuration errors: the caller prints them and
    /// exits with status 1 before the metrics server starts.
    pub fn resolve(
        connection: &str,
        version: Option<&str>,
        pin: Option<u8>,
        temperature_offset: i64,
    ) -> Result<Self, ConfigError> {
        match connection {
            "gpio" => {
                let missing = match (pin, version) {
                    (None, None) => Some("--sensor-pin and --sensor-version"),
                    (None, Some(_)) => Some("--sensor-pin"),
                    (Some(_), None) => Some("--sensor-version"),
                    (Some(_), Some(_)) => None,
                };
                if let Some(flags) = missing {
                    return Err(ConfigError::MissingGpioFlags(flags.to_string()));
                }
                // Both options checked above
                let model = version.unwrap_or_default().parse::<DhtModel>()?;
                let pin = pin.unwrap_or_default();
                Ok(Self::Dht { model, pin })
            }
            "envirophat" => Ok(Self::Envirophat { temperature_offset }),
            other => Err(ConfigError::InvalidConnection(other.to_string())),
        }
    }

    /// The backend this configuration selects.
    pub fn backend(&self) -> BackendKind {
        match self {
            Self::Dht { .. } => BackendKind::Dht,
            Self::Envirophat { .. } => BackendKind::Envirophat,
        }
    }
}

/// Startup configuration errors. All of them are fatal before launch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// GPIO connection selected without its required flags
    #[error("{0} required for GPIO connection")]
    MissingGpioFlags(String),

    /// Connection type is neither `gpio` nor `envirophat`
    #[error("invalid sensor connection '{0}' (expected 'gpio' or 'envirophat')")]
    InvalidConnection(String),

    /// Sensor version is not one of 11, 22, 2302
    #[error("invalid sensor version '{0}' (expected '11', '22' or '2302')")]
    InvalidVersion(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpio_requires_pin_and_version() {
        let err = SensorConfig::resolve("gpio", None, None, 0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("--sensor-pin"), "missing pin flag in: {}", msg);
        assert!(
            msg.contains("--sensor-version"),
            "missing version flag in: {}",
            msg
        );
    }

    #[test]
    fn test_gpio_names_only_the_missing_flag() {
        let err = SensorConfig::resolve("gpio", Some("22"), None, 0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("--sensor-pin"));
        assert!(!msg.contains("--sensor-version"));

        let err = SensorConfig::resolve("gpio", None, Some(4), 0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("--sensor-version"));
        assert!(!msg.contains("--sensor-pin"));
    }

    #[test]
    fn test_unrecognized_connection_rejected() {
        let err = SensorConfig::resolve("bogus", None, None, 0).unwrap_err();
        assert_eq!(err, ConfigError::InvalidConnection("bogus".to_string()));
    }

    #[test]
    fn test_gpio_resolves_models() {
        for (version, model) in [
            ("11", DhtModel::Dht11),
            ("22", DhtModel::Dht22),
            ("2302", DhtModel::Am2302),
        ] {
            let config = SensorConfig::resolve("gpio", Some(version), Some(4), 0).unwrap();
            assert_eq!(config, SensorConfig::Dht { model, pin: 4 });
            assert_eq!(config.backend(), BackendKind::Dht);
        }
    }

    #[test]
    fn test_invalid_version_rejected() {
        let err = SensorConfig::resolve("gpio", Some("21"), Some(4), 0).unwrap_err();
        assert_eq!(err, ConfigError::InvalidVersion("21".to_string()));
    }

    #[test]
    fn test_envirophat_carries_offset() {
        let config = SensorConfig::resolve("envirophat", None, None, 3).unwrap();
        assert_eq!(
            config,
            SensorConfig::Envirophat {
                temperature_offset: 3
            }
        );
        assert_eq!(config.backend(), BackendKind::Envirophat);
    }

    #[test]
    fn test_envirophat_ignores_gpio_flags() {
        // Extra flags are harmless for the envirophat connection
        let config = SensorConfig::resolve("envirophat", Some("22"), Some(4), 0).unwrap();
        assert_eq!(config.backend(), BackendKind::Envirophat);
    }
}
