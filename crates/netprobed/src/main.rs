// # netprobed - Network Probe Daemon
//
// Thin integration layer: parses flags, builds the shared metrics registry,
// wires the HTTP resolver and ICMP prober into the probe engine, and serves
// the exporter on 0.0.0.0:9091 until a signal or a fatal probe failure.
//
// ## Flags
//
// Single-dash long flags are accepted alongside the double-dash form:
//
// - `-ifname <name>`: interface name, used as the `interface` label
// - `-ifip <ip>`: local address the echo request is sent from
// - `-debug[=<bool>]`: emit log lines (silent otherwise)
// - `-echo-url <url>`: IP-echo endpoint
// - `-interval <secs>`: tick period of both periodic tasks
// - `-ping-timeout <secs>`: per-attempt ICMP timeout
// - `-ping-attempts <n>`: ICMP attempts per probe
// - `-on-probe-failure <fatal|retry>`: what a failed probe does to the daemon
//
// ## Example
//
// ```bash
// sudo netprobed -ifname wg0 -ifip 10.8.0.2 -debug
// curl -s http://localhost:9091/metrics
// ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use netprobe_core::{
    EngineConfig, EngineEvent, InterfaceConfig, NetprobeConfig, NetworkMetrics, ProbeConfig,
    ProbeEngine, ProbeFailurePolicy, ResolverConfig,
};
use netprobe_exporter::{ExporterState, LISTEN_ADDR};
use netprobe_icmp::IcmpProber;
use netprobe_ip_http::HttpAddressResolver;
use std::fmt;
use std::net::IpAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (including a fatal probe failure)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetprobeExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<NetprobeExitCode> for ExitCode {
    fn from(code: NetprobeExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Flags whose single-dash spelling is rewritten to the double-dash one
const LONG_FLAGS: &[&str] = &[
    "ifname",
    "ifip",
    "debug",
    "echo-url",
    "interval",
    "ping-timeout",
    "ping-attempts",
    "on-probe-failure",
    "help",
    "version",
];

/// Probe failure policy as spelled on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FailurePolicyArg {
    /// Stop the daemon with a non-zero exit
    Fatal,
    /// Log and try again next tick
    Retry,
}

impl From<FailurePolicyArg> for ProbeFailurePolicy {
    fn from(arg: FailurePolicyArg) -> Self {
        match arg {
            FailurePolicyArg::Fatal => ProbeFailurePolicy::Fatal,
            FailurePolicyArg::Retry => ProbeFailurePolicy::Retry,
        }
    }
}

/// Export the external address and its ping latency as Prometheus gauges
#[derive(Debug, Parser)]
#[command(name = "netprobed", version, about, long_about = None)]
struct Cli {
    /// Network interface name
    #[arg(long, default_value = "")]
    ifname: String,

    /// Network interface ip
    #[arg(long)]
    ifip: Option<String>,

    /// Debug logger
    #[arg(
        long,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        action = ArgAction::Set
    )]
    debug: bool,

    /// IP-echo endpoint
    #[arg(long, default_value = netprobe_core::config::DEFAULT_ECHO_URL)]
    echo_url: String,

    /// Tick period in seconds
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Per-attempt ping timeout in seconds
    #[arg(long, default_value_t = 5)]
    ping_timeout: u64,

    /// Ping attempts per probe
    #[arg(long, default_value_t = 5)]
    ping_attempts: u32,

    /// What a failed probe does to the daemon
    #[arg(long, value_enum, default_value_t = FailurePolicyArg::Fatal)]
    on_probe_failure: FailurePolicyArg,
}

impl Cli {
    /// Build the probe configuration from parsed flags
    fn to_config(&self) -> Result<NetprobeConfig> {
        let mut interface = InterfaceConfig::new(self.ifname.clone());
        if let Some(ifip) = self.ifip.as_deref().filter(|s| !s.is_empty()) {
            let local_ip: IpAddr = ifip
                .parse()
                .with_context(|| format!("-ifip '{}' is not an IP address", ifip))?;
            interface = interface.with_local_ip(local_ip);
        }

        let config = NetprobeConfig {
            interface,
            resolver: ResolverConfig {
                echo_url: self.echo_url.clone(),
                ..ResolverConfig::default()
            },
            probe: ProbeConfig {
                timeout_ms: self.ping_timeout.saturating_mul(1000),
                attempts: self.ping_attempts,
            },
            engine: EngineConfig {
                interval_ms: self.interval.saturating_mul(1000),
                on_probe_failure: self.on_probe_failure.into(),
                ..EngineConfig::default()
            },
        };

        config.validate()?;
        Ok(config)
    }
}

/// Rewrite `-flag` and `-flag=value` to `--flag` / `--flag=value`
///
/// Only known long flags are rewritten; anything else is passed through for
/// clap to report.
fn normalize_flag_style<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || arg.starts_with("--") {
                return arg;
            }
            let Some(rest) = arg.strip_prefix('-') else {
                return arg;
            };
            let name = rest.split_once('=').map_or(rest, |(name, _)| name);
            if LONG_FLAGS.contains(&name) {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_flag_style(std::env::args())) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                NetprobeExitCode::ConfigError.into()
            } else {
                NetprobeExitCode::CleanShutdown.into()
            };
        }
    };

    let config = match cli.to_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return NetprobeExitCode::ConfigError.into();
        }
    };

    // Silent unless -debug
    let log_level = if cli.debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return NetprobeExitCode::ConfigError.into();
    }

    info!("netprobed starting...");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return NetprobeExitCode::RuntimeError.into();
        }
    };

    match rt.block_on(run_daemon(config, LISTEN_ADDR)) {
        Ok(()) => NetprobeExitCode::CleanShutdown.into(),
        Err(e) => {
            // Startup failures are reported even with logging off
            if matches!(e, DaemonError::Startup(_)) {
                eprintln!("{:#}", e);
            }
            error!("{:#}", e);
            e.exit_code().into()
        }
    }
}

/// Why the daemon stopped with an error
#[derive(Debug)]
enum DaemonError {
    /// Failed before the engine started (including bind failure)
    Startup(anyhow::Error),
    /// Failed while running (including a fatal probe failure)
    Runtime(anyhow::Error),
}

impl DaemonError {
    fn exit_code(&self) -> NetprobeExitCode {
        match self {
            DaemonError::Startup(_) => NetprobeExitCode::ConfigError,
            DaemonError::Runtime(_) => NetprobeExitCode::RuntimeError,
        }
    }
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonError::Startup(e) => write!(f, "Startup error: {:#}", e),
            DaemonError::Runtime(e) => write!(f, "Daemon error: {:#}", e),
        }
    }
}

/// Start the daemon on `listen_addr` and run it to completion
async fn run_daemon(config: NetprobeConfig, listen_addr: &str) -> std::result::Result<(), DaemonError> {
    Daemon::start(config, listen_addr).await?.run().await
}

/// Everything acquired at startup
struct Daemon {
    engine: ProbeEngine,
    listener: TcpListener,
    exporter: ExporterState,
}

impl Daemon {
    /// Construct components and bind the listener
    async fn start(config: NetprobeConfig, listen_addr: &str) -> std::result::Result<Self, DaemonError> {
        Self::build(config, listen_addr)
            .await
            .map_err(DaemonError::Startup)
    }

    async fn build(config: NetprobeConfig, listen_addr: &str) -> Result<Self> {
        let metrics = Arc::new(NetworkMetrics::new().context("Failed to create metrics registry")?);

        let resolver = HttpAddressResolver::from_config(&config.interface, &config.resolver)?;
        info!(
            url = resolver.url(),
            local_ip = ?resolver.local_ip(),
            "Using HTTP address resolver"
        );

        let (engine, events) = ProbeEngine::new(
            Box::new(resolver),
            Box::new(IcmpProber::new()),
            Arc::clone(&metrics),
            config,
        )?;
        drain_events(events);

        let listener = TcpListener::bind(listen_addr)
            .await
            .with_context(|| format!("Failed to bind {}", listen_addr))?;

        Ok(Self {
            engine,
            listener,
            exporter: ExporterState::new(metrics),
        })
    }

    /// Run the engine and the exporter until SIGTERM/SIGINT or a fatal probe failure
    async fn run(self) -> std::result::Result<(), DaemonError> {
        let (server_tx, server_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(netprobe_exporter::serve(
            self.listener,
            netprobe_exporter::router(self.exporter),
            async move {
                let _ = server_rx.await;
            },
        ));

        let outcome = self.engine.run().await;

        let _ = server_tx.send(());
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Exporter error: {}", e),
            Err(e) => error!("Exporter task failed: {}", e),
        }

        info!("Shutting down daemon");
        outcome.map_err(|e| DaemonError::Runtime(e.into()))
    }
}

/// Forward engine events to the debug log
fn drain_events(mut events: mpsc::Receiver<EngineEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Engine event");
        }
    });
}
