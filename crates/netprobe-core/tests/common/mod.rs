//! Test doubles and common utilities for engine contract tests
//!
//! The doubles replay a scripted sequence of outcomes and count calls, so the
//! tests can check what the engine did without any network access.

#![allow(dead_code)]

use netprobe_core::config::{EngineConfig, InterfaceConfig, NetprobeConfig, ProbeConfig, ProbeFailurePolicy};
use netprobe_core::error::{Error, Result};
use netprobe_core::traits::{AddressResolver, LatencyProber};
use netprobe_core::EngineEvent;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Tick period used by the contract tests
pub const TICK: Duration = Duration::from_millis(20);

/// Resolver that replays scripted answers; the last answer repeats forever
#[derive(Clone)]
pub struct ScriptedResolver {
    script: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new(script: Vec<std::result::Result<&str, &str>>) -> Self {
        let script = script
            .into_iter()
            .map(|r| r.map(str::to_string).map_err(str::to_string))
            .collect();

        Self {
            script: Arc::new(Mutex::new(script)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always answer with `address`
    pub fn fixed(address: &str) -> Self {
        Self::new(vec![Ok(address)])
    }

    /// Always fail
    pub fn unreachable() -> Self {
        Self::new(vec![Err("connection refused")])
    }

    /// Number of times resolve() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AddressResolver for ScriptedResolver {
    async fn resolve(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap();
        let answer = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        };

        answer.map_err(Error::network)
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// One scripted prober outcome
#[derive(Debug, Clone, Copy)]
pub enum ProbeScript {
    Rtt(Duration),
    Exhausted,
    InitFails,
}

/// Prober that replays scripted outcomes; the last outcome repeats forever
#[derive(Clone)]
pub struct ScriptedProber {
    script: Arc<Mutex<VecDeque<ProbeScript>>>,
    targets: Arc<Mutex<Vec<IpAddr>>>,
}

impl ScriptedProber {
    pub fn new(script: Vec<ProbeScript>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            targets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with `rtt`
    pub fn fixed(rtt: Duration) -> Self {
        Self::new(vec![ProbeScript::Rtt(rtt)])
    }

    /// Every target probed so far, in order
    pub fn targets(&self) -> Vec<IpAddr> {
        self.targets.lock().unwrap().clone()
    }

    /// Number of times probe() was called
    pub fn call_count(&self) -> usize {
        self.targets.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LatencyProber for ScriptedProber {
    async fn probe(&self, target: IpAddr, _timeout: Duration, attempts: u32) -> Result<Duration> {
        self.targets.lock().unwrap().push(target);

        let step = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                *script.front().unwrap()
            }
        };

        match step {
            ProbeScript::Rtt(rtt) => Ok(rtt),
            ProbeScript::Exhausted => Err(Error::probe_exhausted(
                target.to_string(),
                attempts,
                "request timeout",
            )),
            ProbeScript::InitFails => Err(Error::probe_init("operation not permitted")),
        }
    }

    fn prober_name(&self) -> &'static str {
        "scripted"
    }
}

/// Helper to create a minimal configuration for testing
pub fn minimal_config(interface: &str, on_probe_failure: ProbeFailurePolicy) -> NetprobeConfig {
    NetprobeConfig {
        interface: InterfaceConfig::new(interface),
        resolver: Default::default(),
        probe: ProbeConfig {
            timeout_ms: 10,
            attempts: 5,
        },
        engine: EngineConfig {
            interval_ms: TICK.as_millis() as u64,
            on_probe_failure,
            event_channel_capacity: 1000,
        },
    }
}

/// Wait (bounded) for the first event matching `pred`
pub async fn wait_for_event<F>(rx: &mut mpsc::Receiver<EngineEvent>, mut pred: F) -> Option<EngineEvent>
where
    F: FnMut(&EngineEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = rx.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Count the events matching `pred` among those already queued
pub fn drain_matching<F>(rx: &mut mpsc::Receiver<EngineEvent>, mut pred: F) -> usize
where
    F: FnMut(&EngineEvent) -> bool,
{
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        if pred(&event) {
            count += 1;
        }
    }
    count
}
