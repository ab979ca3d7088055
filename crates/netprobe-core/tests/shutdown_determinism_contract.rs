//! Contract Test: Shutdown Determinism
//!
//! Constraints verified:
//! - Engine terminates on shutdown signal
//! - Both periodic tasks exit; nothing resolves or probes afterwards
//! - Shutdown completes even while a probe is in flight
//! - A `Stopped` event is emitted

mod common;

use common::*;
use netprobe_core::traits::LatencyProber;
use netprobe_core::{EngineEvent, NetworkMetrics, ProbeEngine, ProbeFailurePolicy};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn shutdown_signal_terminates_engine() {
    let resolver = ScriptedResolver::fixed("203.0.113.7");
    let prober = ScriptedProber::fixed(Duration::from_millis(12));
    let metrics = Arc::new(NetworkMetrics::new().unwrap());
    let config = minimal_config("eth0", ProbeFailurePolicy::Fatal);

    let (engine, mut event_rx) =
        ProbeEngine::new(Box::new(resolver), Box::new(prober), metrics, config)
            .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let shutdown_result = shutdown_tx.send(());
    assert!(shutdown_result.is_ok(), "shutdown signal send succeeds");

    let result = tokio::time::timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");

    let engine_result = result.unwrap().unwrap();
    tokio_test::assert_ok!(engine_result);

    let stopped = wait_for_event(&mut event_rx, |e| matches!(e, EngineEvent::Stopped { .. })).await;
    assert_eq!(
        stopped,
        Some(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string()
        })
    );
}

#[tokio::test]
async fn dropped_shutdown_sender_stops_engine() {
    let resolver = ScriptedResolver::fixed("203.0.113.7");
    let prober = ScriptedProber::fixed(Duration::from_millis(12));
    let metrics = Arc::new(NetworkMetrics::new().unwrap());
    let config = minimal_config("eth0", ProbeFailurePolicy::Fatal);

    let (engine, _event_rx) =
        ProbeEngine::new(Box::new(resolver), Box::new(prober), metrics, config)
            .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    drop(shutdown_tx);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine.run_with_shutdown(Some(shutdown_rx)),
    )
    .await;

    assert!(result.is_ok(), "Engine should stop when the sender is gone");
    assert!(result.unwrap().is_ok());
}

#[tokio::test]
async fn no_work_after_shutdown() {
    let resolver = ScriptedResolver::fixed("203.0.113.7");
    let prober = ScriptedProber::fixed(Duration::from_millis(12));
    let metrics = Arc::new(NetworkMetrics::new().unwrap());
    let config = minimal_config("eth0", ProbeFailurePolicy::Fatal);

    let (engine, _event_rx) = ProbeEngine::new(
        Box::new(resolver.clone()),
        Box::new(prober.clone()),
        metrics,
        config,
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(TICK * 4).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    let resolves = resolver.call_count();
    let probes = prober.call_count();
    assert!(resolves >= 2, "seed plus at least one refresh, got {}", resolves);

    tokio::time::sleep(TICK * 5).await;

    assert_eq!(resolver.call_count(), resolves, "refresh task leaked past shutdown");
    assert_eq!(prober.call_count(), probes, "probe task leaked past shutdown");
}

#[tokio::test]
async fn shutdown_during_probe() {
    // Prober that takes far longer than the test is willing to wait
    struct SlowProber;

    #[async_trait::async_trait]
    impl LatencyProber for SlowProber {
        async fn probe(
            &self,
            _target: IpAddr,
            _timeout: Duration,
            _attempts: u32,
        ) -> netprobe_core::Result<Duration> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Duration::from_millis(1))
        }

        fn prober_name(&self) -> &'static str {
            "slow"
        }
    }

    let resolver = ScriptedResolver::fixed("203.0.113.7");
    let metrics = Arc::new(NetworkMetrics::new().unwrap());
    let config = minimal_config("eth0", ProbeFailurePolicy::Fatal);

    let (engine, _event_rx) =
        ProbeEngine::new(Box::new(resolver), Box::new(SlowProber), metrics, config)
            .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Let the first probe start
    tokio::time::sleep(TICK * 3).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), engine_handle).await;
    assert!(
        result.is_ok(),
        "Engine should terminate within 5 seconds even during a probe"
    );
}
