//! Component configuration for collaborator calls and settlement.

use std::time::Duration;

/// Default per-call timeout for collaborator HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default simulated gateway latency before a processing payment settles.
pub const DEFAULT_SETTLEMENT_DELAY: Duration = Duration::from_millis(2000);

/// Where the collaborating services live and how long to wait for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorConfig {
    pub product_service_url: String,
    pub order_service_url: String,
    pub inventory_service_url: String,
    pub timeout: Duration,
}

impl CollaboratorConfig {
    /// Builds the HTTP client shared by the HTTP collaborators.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder().timeout(self.timeout).build()
    }
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            product_service_url: "http://localhost:3002".to_string(),
            order_service_url: "http://localhost:3004".to_string(),
            inventory_service_url: "http://localhost:3006".to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Payment settlement timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementConfig {
    pub delay: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_SETTLEMENT_DELAY,
        }
    }
}
