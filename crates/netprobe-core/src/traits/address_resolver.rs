// # Address Resolver Trait
//
// Defines the interface for discovering the host's externally-visible address.
//
// ## Implementations
//
// - HTTP echo service: `netprobe-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use netprobe_core::AddressResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* AddressResolver implementation */;
//
//     let address = resolver.resolve().await?;
//     println!("External address: {}", address);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for address resolver implementations
///
/// A resolver performs exactly one lookup per call. It does not cache,
/// retry, or publish metrics; the engine owns all of that.
///
/// # Returns
///
/// The address text with trailing line terminators removed. The text is not
/// required to parse as an IP address; the engine validates it before
/// probing.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve the current externally-visible address
    ///
    /// # Errors
    ///
    /// [`crate::Error::Network`] when the request, connection or body read
    /// does not complete.
    async fn resolve(&self) -> Result<String, crate::Error>;

    /// Short name used in log lines
    fn resolver_name(&self) -> &'static str;
}
