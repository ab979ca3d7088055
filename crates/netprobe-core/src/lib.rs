// # netprobe-core
//
// Core library for the periodic network-health probe.
//
// ## Architecture Overview
//
// This library provides the core functionality for probing a host's external
// address and the latency to it:
// - **AddressResolver**: Trait for discovering the externally-visible address
// - **LatencyProber**: Trait for measuring round-trip latency to an address
// - **AdminHook**: Trait for the action behind the administrative endpoint
// - **ProbeEngine**: Core engine that runs the refresh and probe tasks
// - **NetworkMetrics**: Registry of the `address` and `latency` gauges
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Scheduling lives here, I/O lives in plugin crates
// 2. **Explicit Context**: Registry and configuration are constructed and passed in, no globals
// 3. **Explicit Failure Policy**: Probe failures reach the engine as values; the policy decides
// 4. **Library-First**: All core functionality can be used as a library

pub mod traits;
pub mod engine;
pub mod metrics;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{AddressResolver, AdminHook, LatencyProber};
pub use engine::{EngineEvent, ProbeEngine};
pub use metrics::NetworkMetrics;
pub use config::{EngineConfig, InterfaceConfig, NetprobeConfig, ProbeConfig, ProbeFailurePolicy, ResolverConfig};
pub use error::{Error, Result};
pub use state::CurrentAddress;
