use room_exporter::{
    calculate_absolute_humidity,
    sensor::envirophat::{reading_from_sample, BoardSample},
    sensor::SensorConfig,
    BackendKind, Reading, RoomMetrics, DEFAULT_ROOM,
};

/// Extract a gauge value from rendered exposition text.
fn series_value(rendered: &str, name: &str, room: &str) -> Option<f64> {
    let prefix = format!("{}{{room=\"{}\"}} ", name, room);
    rendered
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .and_then(|value| value.parse().ok())
}

/// Selecting envirophat with a 3-degree offset and a raw board temperature
/// of 28.0 publishes a temperature gauge of 25.0.
#[test]
fn test_envirophat_offset_end_to_end() {
    let metrics = RoomMetrics::new(BackendKind::Envirophat, "lab");
    let sample = BoardSample {
        temperature: 28.0,
        brightness: 812.0,
        pressure: 100653.25,
    };
    metrics.publish(&reading_from_sample(sample, 3.0));

    let rendered = metrics.render().unwrap();
    assert_eq!(series_value(&rendered, "room_temperature", "lab"), Some(25.0));
}

/// The per-backend presence mask is reflected in which gauges exist at all.
#[test]
fn test_backend_masking() {
    let dht = RoomMetrics::new(BackendKind::Dht, DEFAULT_ROOM);
    let rendered = dht.render().unwrap();
    assert!(rendered.contains("room_temperature"));
    assert!(rendered.contains("room_relative_humidity"));
    assert!(rendered.contains("room_absolute_humidity"));
    assert!(!rendered.contains("room_brightness"));
    assert!(!rendered.contains("room_pressure"));

    let envirophat = RoomMetrics::new(BackendKind::Envirophat, DEFAULT_ROOM);
    let rendered = envirophat.render().unwrap();
    assert!(rendered.contains("room_temperature"));
    assert!(rendered.contains("room_brightness"));
    assert!(rendered.contains("room_pressure"));
    assert!(!rendered.contains("room_relative_humidity"));
    assert!(!rendered.contains("room_absolute_humidity"));
}

/// A failed DHT cycle (all-absent reading) changes nothing.
#[test]
fn test_failed_cycle_keeps_last_values() {
    let metrics = RoomMetrics::new(BackendKind::Dht, "bedroom");
    metrics.publish(&Reading {
        temperature: Some(21.264),
        relative_humidity: Some(50.0),
        absolute_humidity: Some(calculate_absolute_humidity(50.0, 21.264)),
        ..Reading::default()
    });
    let before = metrics.render().unwrap();

    metrics.publish(&Reading::absent());
    let after = metrics.render().unwrap();

    assert_eq!(before, after);
    assert_eq!(
        series_value(&after, "room_temperature", "bedroom"),
        Some(21.3)
    );
}

/// Values are published at their presentation precision.
#[test]
fn test_presentation_precision() {
    let metrics = RoomMetrics::new(BackendKind::Dht, "office");
    metrics.publish(&Reading {
        temperature: Some(21.264),
        relative_humidity: Some(48.37),
        absolute_humidity: Some(8.653),
        ..Reading::default()
    });

    let rendered = metrics.render().unwrap();
    assert_eq!(
        series_value(&rendered, "room_temperature", "office"),
        Some(21.3)
    );
    assert_eq!(
        series_value(&rendered, "room_relative_humidity", "office"),
        Some(48.4)
    );
    assert_eq!(
        series_value(&rendered, "room_absolute_humidity", "office"),
        Some(8.65)
    );
}

/// Startup validation catches the documented misconfigurations.
#[test]
fn test_startup_validation() {
    let err = SensorConfig::resolve("gpio", None, None, 0).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("--sensor-pin"));
    assert!(msg.contains("--sensor-version"));

    assert!(SensorConfig::resolve("bogus", None, None, 0).is_err());
    assert!(SensorConfig::resolve("envirophat", None, None, 3).is_ok());
}

/// The reference point for the absolute humidity formula.
#[test]
fn test_absolute_humidity_reference() {
    let ah = calculate_absolute_humidity(50.0, 20.0);
    assert!((ah - 8.65).abs() < 0.02, "got {}", ah);
}
