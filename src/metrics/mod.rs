//! Prometheus metrics registry and publishing.

pub mod registry;

pub use registry::RoomMetrics;
