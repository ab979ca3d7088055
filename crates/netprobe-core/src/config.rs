//! Configuration types for the network probe
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Default IP-echo endpoint
pub const DEFAULT_ECHO_URL: &str = "https://icanhazip.com";

/// Main probe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetprobeConfig {
    /// Interface the measurements are attributed to
    #[serde(default)]
    pub interface: InterfaceConfig,

    /// Address resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Latency probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Scheduler settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl NetprobeConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.resolver.validate()?;
        self.probe.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Network interface configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name (e.g., "eth0"), used as the `interface` metric label
    #[serde(default)]
    pub name: String,

    /// Interface-local IP the echo request is sent from
    #[serde(default)]
    pub local_ip: Option<IpAddr>,
}

impl InterfaceConfig {
    /// Create an interface configuration with no local address binding
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_ip: None,
        }
    }

    /// Bind outbound requests to a local address
    pub fn with_local_ip(mut self, local_ip: IpAddr) -> Self {
        self.local_ip = Some(local_ip);
        self
    }
}

/// Address resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// URL of the "echo my IP" service
    #[serde(default = "default_echo_url")]
    pub echo_url: String,

    /// HTTP request timeout (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.echo_url.is_empty() {
            return Err(crate::Error::config("Echo URL cannot be empty"));
        }
        if !self.echo_url.starts_with("https://") && !self.echo_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Echo URL must use HTTP or HTTPS scheme. Got: {}",
                self.echo_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            echo_url: default_echo_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Upper bound on echo attempts per probe
pub const MAX_PROBE_ATTEMPTS: u32 = u16::MAX as u32;

/// Latency probe configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Timeout for a single echo attempt (in milliseconds)
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of echo attempts per probe
    #[serde(default = "default_probe_attempts")]
    pub attempts: u32,
}

impl ProbeConfig {
    /// Validate the probe configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_ms == 0 {
            return Err(crate::Error::config("Probe timeout must be > 0"));
        }
        if self.attempts == 0 {
            return Err(crate::Error::config("Probe attempts must be > 0"));
        }
        if self.attempts > MAX_PROBE_ATTEMPTS {
            return Err(crate::Error::config(format!(
                "Probe attempts must be <= {} (one ICMP sequence number each)",
                MAX_PROBE_ATTEMPTS
            )));
        }
        Ok(())
    }

    /// Per-attempt timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout_ms(),
            attempts: default_probe_attempts(),
        }
    }
}

/// What the scheduler does when the latency prober fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeFailurePolicy {
    /// Stop the engine and report the error
    #[default]
    Fatal,
    /// Log and probe again on the next tick
    Retry,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tick period shared by the refresh and probe tasks (in milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Reaction to prober failures
    #[serde(default)]
    pub on_probe_failure: ProbeFailurePolicy,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_ms == 0 {
            return Err(crate::Error::config("Engine interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Tick period as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            on_probe_failure: ProbeFailurePolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_echo_url() -> String {
    DEFAULT_ECHO_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_probe_attempts() -> u32 {
    5
}

fn default_interval_ms() -> u64 {
    5_000
}

fn default_event_channel_capacity() -> usize {
    1000
}
