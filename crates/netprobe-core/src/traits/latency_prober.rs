// # Latency Prober Trait
//
// Defines the interface for measuring round-trip latency to an address.
//
// ## Implementations
//
// - ICMP echo: `netprobe-icmp` crate

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

/// Trait for latency prober implementations
///
/// The prober owns the attempt loop: it sends up to `attempts` echo requests,
/// each bounded by `timeout`, and decides how the successful round trips are
/// aggregated into the single returned value.
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait LatencyProber: Send + Sync {
    /// Probe `target` and return one aggregate round-trip time
    ///
    /// # Errors
    ///
    /// - [`crate::Error::ProbeInit`]: the prober could not be set up
    /// - [`crate::Error::ProbeExhausted`]: every attempt failed
    async fn probe(
        &self,
        target: IpAddr,
        timeout: Duration,
        attempts: u32,
    ) -> Result<Duration, crate::Error>;

    /// Short name used in log lines
    fn prober_name(&self) -> &'static str;
}
