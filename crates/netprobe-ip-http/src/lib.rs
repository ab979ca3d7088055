// # HTTP Address Resolver
//
// This crate provides the HTTP-based address resolver for netprobe.
//
// ## Architecture
//
// Issues one GET to an "echo my IP" service (e.g., icanhazip.com) per call
// and returns the body with its trailing line terminators removed. The
// engine decides when to call it; this crate never polls, caches, or retries.
//
// ## Local Address Binding
//
// When the interface configuration carries a local IP, every outbound
// connection is made from that address, so the request leaves through the
// interface that owns it.

use netprobe_core::config::{InterfaceConfig, ResolverConfig};
use netprobe_core::traits::AddressResolver;
use netprobe_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

use tracing::debug;

/// HTTP echo-service address resolver
#[derive(Debug, Clone)]
pub struct HttpAddressResolver {
    /// URL to fetch the address from
    url: String,

    /// Local address outbound connections are bound to
    local_ip: Option<IpAddr>,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpAddressResolver {
    /// Create a new HTTP address resolver
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch the address from (e.g., "https://icanhazip.com")
    /// - `local_ip`: Source address for outbound connections (None = OS choice)
    /// - `timeout`: Whole-request timeout
    pub fn new(url: impl Into<String>, local_ip: Option<IpAddr>, timeout: Duration) -> Result<Self> {
        // No proxy: the request must leave through the probed interface
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .local_address(local_ip)
            .no_proxy()
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            local_ip,
            client,
        })
    }

    /// Create from configuration
    pub fn from_config(interface: &InterfaceConfig, resolver: &ResolverConfig) -> Result<Self> {
        resolver.validate()?;
        Self::new(
            resolver.echo_url.clone(),
            interface.local_ip,
            resolver.request_timeout(),
        )
    }

    /// URL this resolver queries
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Local address outbound connections are bound to
    pub fn local_ip(&self) -> Option<IpAddr> {
        self.local_ip
    }

    /// Fetch the address text from the echo service
    async fn fetch_address(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::network(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::network(format!("HTTP error: {}", response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read response: {}", e)))?;

        let address = trim_line_endings(&body);
        if address.is_empty() {
            return Err(Error::network("Echo service returned an empty body"));
        }

        Ok(address.to_string())
    }
}

/// Strip every trailing `\r` and `\n`
pub fn trim_line_endings(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

#[async_trait::async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self) -> Result<String> {
        let address = self.fetch_address().await?;
        debug!(url = %self.url, address = %address, "Resolved external address");
        Ok(address)
    }

    fn resolver_name(&self) -> &'static str {
        "http"
    }
}
