//! Core probe engine
//!
//! The ProbeEngine is responsible for:
//! - Seeding the current address once at startup
//! - Refreshing the current address every tick (address refresh task)
//! - Probing latency to the current address every tick (latency probe task)
//! - Publishing both to the metrics registry
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐                         ┌─────────────────┐
//! │ AddressResolver │                         │  LatencyProber  │
//! └─────────────────┘                         └─────────────────┘
//!          ▲                                           ▲
//!          │ every tick                      every tick│
//! ┌─────────────────┐    ┌────────────────┐   ┌─────────────────┐
//! │  refresh task   │───▶│ CurrentAddress │──▶│   probe task    │
//! └─────────────────┘    └────────────────┘   └─────────────────┘
//!          │                                           │
//!          └──────────────▶ NetworkMetrics ◀───────────┘
//! ```
//!
//! ## Failure Handling
//!
//! - Resolver errors: logged, previous address kept, next tick retries
//! - Unparseable or missing address: logged, this tick's probe skipped
//! - Prober errors: handled per [`ProbeFailurePolicy`]

use crate::config::{NetprobeConfig, ProbeFailurePolicy};
use crate::error::{Error, Result};
use crate::metrics::NetworkMetrics;
use crate::state::CurrentAddress;
use crate::traits::{AddressResolver, LatencyProber};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Events emitted by the ProbeEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        interface: String,
    },

    /// A resolution succeeded and replaced the current address
    AddressResolved {
        address: String,
        previous: Option<String>,
    },

    /// A resolution failed; the current address was kept
    AddressRefreshFailed {
        error: String,
    },

    /// A latency probe succeeded
    LatencyMeasured {
        address: String,
        rtt: Duration,
    },

    /// A tick's probe was skipped (no usable address)
    ProbeSkipped {
        reason: String,
    },

    /// The latency prober failed
    ProbeFailed {
        address: String,
        error: String,
        fatal: bool,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// State shared by the engine and its two periodic tasks
struct Shared {
    resolver: Box<dyn AddressResolver>,
    prober: Box<dyn LatencyProber>,
    metrics: Arc<NetworkMetrics>,
    current: CurrentAddress,
    interface: String,
    probe_timeout: Duration,
    probe_attempts: u32,
    on_probe_failure: ProbeFailurePolicy,
    /// Set once the engine stops; gauge writes happen under this lock
    halted: Mutex<bool>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Shared {
    /// Run `publish` unless the engine has halted
    ///
    /// Returns whether it ran. Halting takes the same lock, so no write can
    /// land after [`halt`](Self::halt) returns.
    fn publish_if_running(&self, publish: impl FnOnce(&NetworkMetrics)) -> bool {
        let halted = self.halted.lock().unwrap_or_else(PoisonError::into_inner);
        if *halted {
            return false;
        }
        publish(&self.metrics);
        true
    }

    /// Stop all further gauge writes
    fn halt(&self) {
        *self.halted.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Resolve the external address and publish it
    ///
    /// On failure the current address is left untouched.
    async fn refresh_address(&self) {
        match self.resolver.resolve().await {
            Ok(address) => {
                let published = self.publish_if_running(|metrics| {
                    metrics.record_address(&self.interface, &address)
                });
                if !published {
                    debug!("Engine halted, discarding resolved address {}", address);
                    return;
                }

                let previous = self.current.replace(address.clone()).await;

                info!(interface = %self.interface, address = %address, "Configured network IP address");
                self.emit_event(EngineEvent::AddressResolved { address, previous });
            }
            Err(e) => {
                warn!(
                    resolver = self.resolver.resolver_name(),
                    error = %e,
                    "Address refresh failed, keeping previous address"
                );
                self.emit_event(EngineEvent::AddressRefreshFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Probe the current address once and publish the round trip
    async fn probe_latency(&self, address: Option<String>) -> Result<()> {
        let address = address.ok_or_else(|| Error::resolution("no address resolved yet"))?;

        let target: IpAddr = address
            .parse()
            .map_err(|e| Error::resolution(format!("'{}' is not an IP address: {}", address, e)))?;

        info!("Pinging: {}", address);

        let rtt = self
            .prober
            .probe(target, self.probe_timeout, self.probe_attempts)
            .await
            .map_err(|e| self.tag_probe_error(e, &address))?;

        let published = self.publish_if_running(|metrics| {
            metrics.record_latency(&self.interface, &address, rtt)
        });
        if !published {
            return Ok(());
        }

        info!(address = %address, rtt_ms = rtt.as_secs_f64() * 1000.0, "Configured network IP address ping");
        self.emit_event(EngineEvent::LatencyMeasured { address, rtt });

        Ok(())
    }

    /// Make sure prober failures still carry the address they were about
    fn tag_probe_error(&self, err: Error, address: &str) -> Error {
        match err {
            Error::ProbeInit(_) | Error::ProbeExhausted { .. } => err,
            other => Error::probe_exhausted(address, self.probe_attempts, other.to_string()),
        }
    }

    /// Apply the failure policy to a probe tick's outcome
    ///
    /// Returns `Err` only when the engine must stop.
    async fn handle_probe_tick(&self) -> Result<()> {
        let address = self.current.get().await;
        let Err(e) = self.probe_latency(address.clone()).await else {
            return Ok(());
        };

        if !e.is_probe_failure() {
            self.publish_if_running(|metrics| metrics.clear_latency(&self.interface));
            warn!(error = %e, "Skipping latency probe");
            self.emit_event(EngineEvent::ProbeSkipped {
                reason: e.to_string(),
            });
            return Ok(());
        }

        let address = address.unwrap_or_default();
        match self.on_probe_failure {
            ProbeFailurePolicy::Fatal => {
                self.halt();
                error!(
                    prober = self.prober.prober_name(),
                    error = %e,
                    "Latency probe failed, stopping engine"
                );
                self.emit_event(EngineEvent::ProbeFailed {
                    address,
                    error: e.to_string(),
                    fatal: true,
                });
                Err(e)
            }
            ProbeFailurePolicy::Retry => {
                // A stale round trip must not outlive a failed probe
                self.publish_if_running(|metrics| metrics.clear_latency(&self.interface));
                warn!(
                    prober = self.prober.prober_name(),
                    error = %e,
                    "Latency probe failed, retrying next tick"
                );
                self.emit_event(EngineEvent::ProbeFailed {
                    address,
                    error: e.to_string(),
                    fatal: false,
                });
                Ok(())
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Core probe engine
///
/// ## Lifecycle
///
/// 1. Create with [`ProbeEngine::new()`]
/// 2. Start with [`ProbeEngine::run()`]
/// 3. Engine runs until a shutdown signal, or until a fatal probe failure
/// 4. Drop to cleanup
///
/// ## Threading
///
/// Address refresh and latency probing run as two spawned tasks on the same
/// tick period. They share the current address through [`CurrentAddress`],
/// so the probe task always reads a whole address. Within a single tick there
/// is no ordering between the two tasks: the probe may still use the address
/// from the previous tick.
pub struct ProbeEngine {
    shared: Arc<Shared>,
    interval: Duration,
}

impl ProbeEngine {
    /// Create a new probe engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: Address resolver implementation
    /// - `prober`: Latency prober implementation
    /// - `metrics`: Registry the engine publishes into
    /// - `config`: Probe configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: Box<dyn AddressResolver>,
        prober: Box<dyn LatencyProber>,
        metrics: Arc<NetworkMetrics>,
        config: NetprobeConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let shared = Shared {
            resolver,
            prober,
            metrics,
            current: CurrentAddress::new(),
            interface: config.interface.name,
            probe_timeout: config.probe.timeout(),
            probe_attempts: config.probe.attempts,
            on_probe_failure: config.engine.on_probe_failure,
            halted: Mutex::new(false),
            event_tx: tx,
        };

        let engine = Self {
            shared: Arc::new(shared),
            interval: config.engine.interval(),
        };

        Ok((engine, rx))
    }

    /// Handle to the shared current address
    pub fn current_address(&self) -> CurrentAddress {
        self.shared.current.clone()
    }

    /// Run the engine
    ///
    /// Stops on SIGINT or SIGTERM, or with an error on a fatal probe failure.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal probe failure
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Used by the daemon, which owns signal handling for the whole process,
    /// and by tests.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.shared.emit_event(EngineEvent::Started {
            interface: self.shared.interface.clone(),
        });

        // Seed before either task starts; failure leaves the address empty
        self.shared.refresh_address().await;
        match self.shared.current.get().await {
            Some(address) => info!("Initial address: {}", address),
            None => warn!("Initial address resolution failed, starting without an address"),
        }

        let mut refresh_task = tokio::spawn(refresh_loop(Arc::clone(&self.shared), self.interval));
        let mut probe_task = tokio::spawn(probe_loop(Arc::clone(&self.shared), self.interval));

        let outcome = tokio::select! {
            joined = &mut probe_task => match joined {
                Ok(result) => result,
                Err(e) => Err(Error::Other(format!("Latency probe task failed: {}", e))),
            },
            joined = &mut refresh_task => match joined {
                Ok(()) => Ok(()),
                Err(e) => Err(Error::Other(format!("Address refresh task failed: {}", e))),
            },
            _ = wait_for_shutdown(shutdown_rx) => {
                info!("Shutdown signal received");
                Ok(())
            }
        };

        // Nothing may publish after this point
        self.shared.halt();
        if !refresh_task.is_finished() {
            refresh_task.abort();
            let _ = refresh_task.await;
        }
        if !probe_task.is_finished() {
            probe_task.abort();
            let _ = probe_task.await;
        }

        let reason = match &outcome {
            Ok(()) => "Shutdown signal".to_string(),
            Err(e) => e.to_string(),
        };
        self.shared.emit_event(EngineEvent::Stopped { reason });
        info!("Engine stopped");

        outcome
    }
}

/// Ticker firing one period from now, then every period
fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn refresh_loop(shared: Arc<Shared>, period: Duration) {
    let mut ticker = ticker(period);
    loop {
        ticker.tick().await;
        shared.refresh_address().await;
    }
}

async fn probe_loop(shared: Arc<Shared>, period: Duration) -> Result<()> {
    let mut ticker = ticker(period);
    loop {
        ticker.tick().await;
        shared.handle_probe_tick().await?;
    }
}

async fn wait_for_shutdown(shutdown_rx: Option<oneshot::Receiver<()>>) {
    match shutdown_rx {
        Some(rx) => {
            let _ = rx.await;
        }
        None => wait_for_signal().await,
    }
}

/// Wait for SIGINT or SIGTERM
#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("Failed to setup SIGTERM handler: {}", e);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = wait_for_ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for CTRL-C: {}", e);
        std::future::pending::<()>().await;
    }
}
