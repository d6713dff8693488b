//! Absolute humidity derivation.

/// Convert relative humidity and temperature into absolute humidity.
///
/// Uses the Magnus-form approximation of the saturation vapor pressure,
/// scaled to grams of water vapor per cubic meter of air. Temperature is in
/// degrees Celsius, relative humidity in percent.
pub fn calculate_absolute_humidity(relative_humidity: f64, temperature: f64) -> f64 {
    (6.112 * ((17.67 * temperature) / (temperature + 243.5)).exp() * relative_humidity * 2.1674)
        / (273.15 + temperature)
}
