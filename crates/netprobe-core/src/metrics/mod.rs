//! Metrics registry
//!
//! Holds the two labeled gauge vectors the probe publishes and renders them
//! in the Prometheus text exposition format.
//!
//! ## Gauges
//!
//! - `network_address_entries{interface, address}`: constant `1` marking the
//!   last known external address of an interface
//! - `network_ping{interface, address}`: last measured round trip, in seconds
//!
//! Each interface keeps at most one series per gauge. Recording a new address
//! removes the series labeled with the previous one.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use netprobe_core::metrics::NetworkMetrics;
//!
//! let metrics = std::sync::Arc::new(NetworkMetrics::new()?);
//! metrics.record_address("eth0", "203.0.113.7");
//! let body = metrics.render()?;
//! ```

use crate::error::Result;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Metric name of the address gauge
pub const ADDRESS_METRIC: &str = "network_address_entries";

/// Metric name of the latency gauge
pub const LATENCY_METRIC: &str = "network_ping";

/// Value stored in the address gauge; the address itself lives in the label
pub const ADDRESS_PRESENT: f64 = 1.0;

const LABELS: &[&str] = &["interface", "address"];

/// Gauge vector plus the address label currently published per interface
struct LabeledGauge {
    gauge: GaugeVec,
    current: Mutex<HashMap<String, String>>,
}

impl LabeledGauge {
    fn new(name: &str, help: &str) -> Result<Self> {
        Ok(Self {
            gauge: GaugeVec::new(Opts::new(name, help), LABELS)?,
            current: Mutex::new(HashMap::new()),
        })
    }

    /// Set the series for `(interface, address)`, dropping the interface's previous series
    fn set(&self, interface: &str, address: &str, value: f64) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = current.insert(interface.to_string(), address.to_string())
            && previous != address
        {
            // Missing series is fine, the map is the only writer
            let _ = self.gauge.remove_label_values(&[interface, previous.as_str()]);
            debug!(interface, previous = %previous, "Dropped stale series");
        }

        self.gauge.with_label_values(&[interface, address]).set(value);
    }

    /// Remove the interface's series, if any
    fn clear(&self, interface: &str) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = current.remove(interface) {
            let _ = self.gauge.remove_label_values(&[interface, previous.as_str()]);
            debug!(interface, previous = %previous, "Cleared series");
        }
    }
}

/// The probe's metrics registry
///
/// Constructed once at startup and shared behind an `Arc`. All methods take
/// `&self`; prometheus gauges are internally synchronized.
pub struct NetworkMetrics {
    registry: Registry,
    address: LabeledGauge,
    latency: LabeledGauge,
}

impl NetworkMetrics {
    /// Create a registry with both gauge vectors registered
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let address = LabeledGauge::new(ADDRESS_METRIC, "Current network ip address entries")?;
        let latency = LabeledGauge::new(
            LATENCY_METRIC,
            "Current network ip address ping round trip in seconds",
        )?;

        registry.register(Box::new(address.gauge.clone()))?;
        registry.register(Box::new(latency.gauge.clone()))?;

        Ok(Self {
            registry,
            address,
            latency,
        })
    }

    /// Publish `address` as the current external address of `interface`
    pub fn record_address(&self, interface: &str, address: &str) {
        self.address.set(interface, address, ADDRESS_PRESENT);
    }

    /// Publish a round-trip measurement for `address` on `interface`
    pub fn record_latency(&self, interface: &str, address: &str, rtt: Duration) {
        self.latency.set(interface, address, rtt.as_secs_f64());
    }

    /// Withdraw the latency sample of `interface` until the next successful probe
    pub fn clear_latency(&self, interface: &str) {
        self.latency.clear(interface);
    }

    /// Render every registered gauge in the text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| crate::Error::Metrics(e.to_string()))
    }

    /// Content type of [`render`](Self::render)'s output
    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }

    /// Current value of the sample `metric{interface, address}`, if published
    pub fn sample(&self, metric: &str, interface: &str, address: &str) -> Option<f64> {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == metric)
            .flat_map(|family| family.get_metric().iter())
            .find(|m| {
                let label = |name: &str| {
                    m.get_label()
                        .iter()
                        .find(|pair| pair.get_name() == name)
                        .map(|pair| pair.get_value().to_string())
                };
                label("interface").as_deref() == Some(interface)
                    && label("address").as_deref() == Some(address)
            })
            .map(|m| m.get_gauge().get_value())
    }

    /// Addresses currently published in `metric` for `interface`
    pub fn addresses(&self, metric: &str, interface: &str) -> Vec<String> {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == metric)
            .flat_map(|family| family.get_metric().iter())
            .filter(|m| {
                m.get_label()
                    .iter()
                    .any(|pair| pair.get_name() == "interface" && pair.get_value() == interface)
            })
            .filter_map(|m| {
                m.get_label()
                    .iter()
                    .find(|pair| pair.get_name() == "address")
                    .map(|pair| pair.get_value().to_string())
            })
            .collect()
    }
}

impl std::fmt::Debug for NetworkMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_renders() {
        let metrics = NetworkMetrics::new().unwrap();

        let body = metrics.render().unwrap();
        assert!(!body.contains("network_address_entries{"));
        assert!(!body.contains("network_ping{"));
    }

    #[test]
    fn address_is_published_as_label() {
        let metrics = NetworkMetrics::new().unwrap();

        metrics.record_address("eth0", "203.0.113.7");

        assert_eq!(
            metrics.sample(ADDRESS_METRIC, "eth0", "203.0.113.7"),
            Some(ADDRESS_PRESENT)
        );
        let body = metrics.render().unwrap();
        let line = body
            .lines()
            .find(|l| l.starts_with("network_address_entries{"))
            .unwrap();
        assert!(line.contains(r#"interface="eth0""#));
        assert!(line.contains(r#"address="203.0.113.7""#));
    }

    #[test]
    fn new_address_replaces_previous_series() {
        let metrics = NetworkMetrics::new().unwrap();

        for address in ["198.51.100.1", "198.51.100.2", "203.0.113.7"] {
            metrics.record_address("eth0", address);
        }

        assert_eq!(metrics.addresses(ADDRESS_METRIC, "eth0"), vec!["203.0.113.7"]);
        assert_eq!(metrics.sample(ADDRESS_METRIC, "eth0", "198.51.100.1"), None);
    }

    #[test]
    fn interfaces_are_tracked_independently() {
        let metrics = NetworkMetrics::new().unwrap();

        metrics.record_address("eth0", "198.51.100.1");
        metrics.record_address("wg0", "203.0.113.7");
        metrics.record_address("eth0", "198.51.100.2");

        assert_eq!(metrics.addresses(ADDRESS_METRIC, "eth0"), vec!["198.51.100.2"]);
        assert_eq!(metrics.addresses(ADDRESS_METRIC, "wg0"), vec!["203.0.113.7"]);
    }

    #[test]
    fn latency_is_recorded_in_seconds() {
        let metrics = NetworkMetrics::new().unwrap();

        metrics.record_latency("eth0", "203.0.113.7", Duration::from_millis(250));
        metrics.record_latency("eth0", "203.0.113.7", Duration::from_millis(125));

        assert_eq!(metrics.sample(LATENCY_METRIC, "eth0", "203.0.113.7"), Some(0.125));
        assert_eq!(metrics.addresses(LATENCY_METRIC, "eth0").len(), 1);
    }

    #[test]
    fn cleared_latency_is_withdrawn() {
        let metrics = NetworkMetrics::new().unwrap();

        metrics.record_address("eth0", "203.0.113.7");
        metrics.record_latency("eth0", "203.0.113.7", Duration::from_millis(12));
        metrics.record_latency("wg0", "198.51.100.1", Duration::from_millis(30));
        metrics.clear_latency("eth0");

        assert_eq!(metrics.sample(LATENCY_METRIC, "eth0", "203.0.113.7"), None);
        assert_eq!(metrics.sample(LATENCY_METRIC, "wg0", "198.51.100.1"), Some(0.03));
        assert_eq!(
            metrics.sample(ADDRESS_METRIC, "eth0", "203.0.113.7"),
            Some(ADDRESS_PRESENT)
        );

        // Clearing twice is harmless, and recording again works
        metrics.clear_latency("eth0");
        metrics.record_latency("eth0", "203.0.113.7", Duration::from_millis(15));
        assert_eq!(metrics.sample(LATENCY_METRIC, "eth0", "203.0.113.7"), Some(0.015));
    }

    #[test]
    fn content_type_is_text_exposition() {
        let metrics = NetworkMetrics::new().unwrap();
        assert!(metrics.content_type().starts_with("text/plain"));
    }
}
