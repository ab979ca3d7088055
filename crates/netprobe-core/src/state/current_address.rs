// # Current Address Cell
//
// The last successfully resolved external address, shared by the refresh
// task (single writer) and the probe task (reader).
//
// ## Lifecycle
//
// - Created empty at startup
// - Seeded once by the startup resolution (best effort)
// - Replaced on every successful refresh, never cleared
// - Dropped at process exit; nothing is persisted

use std::sync::Arc;
use tokio::sync::RwLock;

/// Synchronized cell holding the current external address
///
/// Clones share the same underlying value. Readers always observe either the
/// previous or the new address, never a partially written one.
///
/// # Example
///
/// ```rust,no_run
/// use netprobe_core::state::CurrentAddress;
///
/// #[tokio::main]
/// async fn main() {
///     let current = CurrentAddress::new();
///     assert_eq!(current.get().await, None);
///
///     current.replace("203.0.113.7".to_string()).await;
///     assert_eq!(current.get().await.as_deref(), Some("203.0.113.7"));
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CurrentAddress {
    inner: Arc<RwLock<Option<String>>>,
}

impl CurrentAddress {
    /// Create an empty cell
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current address, `None` until the first successful resolution
    pub async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }

    /// Store a newly resolved address, returning the one it replaces
    pub async fn replace(&self, address: String) -> Option<String> {
        let mut guard = self.inner.write().await;
        guard.replace(address)
    }

    /// Whether an address has been resolved yet
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_none()
    }
}
