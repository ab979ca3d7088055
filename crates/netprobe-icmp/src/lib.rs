//! ICMP echo latency prober.
//!
//! Sends echo requests with `surge-ping` and reports the round trip of the
//! first attempt that gets a reply. Opening an ICMP socket usually needs
//! `CAP_NET_RAW` (or a permissive `net.ipv4.ping_group_range`); without it
//! every probe fails with a probe initialization error.

use std::net::IpAddr;
use std::time::Duration;

use netprobe_core::traits::LatencyProber;
use netprobe_core::{Error, Result};
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tracing::debug;

/// Echo payload, the same size `ping` sends by default.
const PAYLOAD: [u8; 56] = [0; 56];

/// ICMP echo prober.
///
/// A fresh client is opened for every probe, bound to the unspecified
/// address of the target's family, so a prober can follow a target that
/// switches between IPv4 and IPv6.
#[derive(Debug, Clone, Default)]
pub struct IcmpProber;

impl IcmpProber {
    /// Create a new prober.
    pub fn new() -> Self {
        Self
    }
}

/// Client configuration for the target's address family.
fn client_for(target: IpAddr) -> std::io::Result<Client> {
    match target {
        IpAddr::V4(_) => Client::new(&Config::default()),
        IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
    }
}

/// One echo request/reply exchange.
trait EchoAttempt {
    async fn attempt(&mut self, seq: u16) -> std::result::Result<Duration, String>;
}

impl EchoAttempt for surge_ping::Pinger {
    async fn attempt(&mut self, seq: u16) -> std::result::Result<Duration, String> {
        self.ping(PingSequence(seq), &PAYLOAD)
            .await
            .map(|(_, rtt)| rtt)
            .map_err(|e| e.to_string())
    }
}

/// Number of attempts that fit in the ICMP sequence space
fn sequence_budget(attempts: u32) -> u16 {
    u16::try_from(attempts).unwrap_or(u16::MAX)
}

/// Run up to `attempts` attempts and return the first success.
///
/// Fails with the last attempt's error message when none succeed.
async fn first_success<A: EchoAttempt>(
    attempts: u16,
    echo: &mut A,
) -> std::result::Result<Duration, String> {
    let mut last_error = String::from("no attempts made");

    for seq in 0..attempts {
        match echo.attempt(seq).await {
            Ok(rtt) => return Ok(rtt),
            Err(e) => {
                debug!(attempt = seq + 1, error = %e, "Echo attempt failed");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

#[async_trait::async_trait]
impl LatencyProber for IcmpProber {
    async fn probe(&self, target: IpAddr, timeout: Duration, attempts: u32) -> Result<Duration> {
        let client = client_for(target)
            .map_err(|e| Error::probe_init(format!("Failed to create ICMP client: {}", e)))?;

        let mut pinger = client.pinger(target, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let outcome = first_success(sequence_budget(attempts), &mut pinger).await;

        match outcome {
            Ok(rtt) => {
                debug!(target = %target, rtt_ms = rtt.as_secs_f64() * 1000.0, "Ping probe successful");
                Ok(rtt)
            }
            Err(e) => Err(Error::probe_exhausted(target.to_string(), attempts, e)),
        }
    }

    fn prober_name(&self) -> &'static str {
        "icmp"
    }
}
