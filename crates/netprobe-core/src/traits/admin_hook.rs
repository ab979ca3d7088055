// # Admin Hook Trait
//
// Extension point behind the administrative HTTP endpoint.
//
// The exporter ships no implementation. Deployments that want the endpoint to
// do something (for example, restart a VPN interface) install their own hook.

use async_trait::async_trait;

/// Action triggered by the administrative endpoint
#[async_trait]
pub trait AdminHook: Send + Sync {
    /// Run the action once
    async fn trigger(&self) -> Result<(), crate::Error>;

    /// Short name used in log lines
    fn hook_name(&self) -> &'static str;
}
