//! Core traits for the network probe
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressResolver`]: Discover the externally-visible address
//! - [`LatencyProber`]: Measure round-trip latency to an address
//! - [`AdminHook`]: Action behind the administrative endpoint

pub mod address_resolver;
pub mod latency_prober;
pub mod admin_hook;

pub use address_resolver::AddressResolver;
pub use latency_prober::LatencyProber;
pub use admin_hook::AdminHook;
