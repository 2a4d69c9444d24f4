//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use fulfillment::{CollaboratorConfig, SettlementConfig};
use fulfillment::config::{DEFAULT_HTTP_TIMEOUT, DEFAULT_SETTLEMENT_DELAY};

/// Which service routes this process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceMode {
    /// Every service in one process, wired in-process.
    #[default]
    All,
    Order,
    Payment,
    Inventory,
    Product,
}

impl ServiceMode {
    pub fn serves_orders(&self) -> bool {
        matches!(self, ServiceMode::All | ServiceMode::Order)
    }

    pub fn serves_payments(&self) -> bool {
        matches!(self, ServiceMode::All | ServiceMode::Payment)
    }

    pub fn serves_inventory(&self) -> bool {
        matches!(self, ServiceMode::All | ServiceMode::Inventory)
    }

    pub fn serves_products(&self) -> bool {
        matches!(self, ServiceMode::All | ServiceMode::Product)
    }
}

impl FromStr for ServiceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(ServiceMode::All),
            "order" => Ok(ServiceMode::Order),
            "payment" => Ok(ServiceMode::Payment),
            "inventory" => Ok(ServiceMode::Inventory),
            "product" => Ok(ServiceMode::Product),
            other => Err(format!("unknown service: {other}")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `SERVICE`: `all`, `order`, `payment`, `inventory` or `product`
/// - `APP_ENV`: `production` hides error details from responses
/// - `JWT_SECRET`: HS256 secret for bearer tokens
/// - `DATABASE_URL`: PostgreSQL URL; unset means in-memory storage
/// - `PRODUCT_SERVICE_URL`, `ORDER_SERVICE_URL`, `INVENTORY_SERVICE_URL`
/// - `HTTP_TIMEOUT_MS`, `SETTLEMENT_DELAY_MS`
///
/// Unparseable values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub service: ServiceMode,
    pub environment: String,
    pub jwt_secret: String,
    pub database_url: Option<String>,
    pub product_service_url: String,
    pub order_service_url: String,
    pub inventory_service_url: String,
    pub http_timeout: Duration,
    pub settlement_delay: Duration,
}

/// Secret used when `JWT_SECRET` is unset. Fine for local runs only.
pub const DEV_JWT_SECRET: &str = "dev-secret-change-me";

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        fn parse<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.parse().ok())
        }
        let millis = |key: &str, default: Duration| {
            parse::<u64>(&lookup, key).map(Duration::from_millis).unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: parse(&lookup, "LOG_FORMAT").unwrap_or(defaults.log_format),
            service: parse(&lookup, "SERVICE").unwrap_or(defaults.service),
            environment: lookup("APP_ENV").unwrap_or(defaults.environment),
            jwt_secret: lookup("JWT_SECRET")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.jwt_secret),
            database_url: lookup("DATABASE_URL").filter(|s| !s.is_empty()),
            product_service_url: lookup("PRODUCT_SERVICE_URL")
                .unwrap_or(defaults.product_service_url),
            order_service_url: lookup("ORDER_SERVICE_URL").unwrap_or(defaults.order_service_url),
            inventory_service_url: lookup("INVENTORY_SERVICE_URL")
                .unwrap_or(defaults.inventory_service_url),
            http_timeout: millis("HTTP_TIMEOUT_MS", defaults.http_timeout),
            settlement_delay: millis("SETTLEMENT_DELAY_MS", defaults.settlement_delay),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Whether error responses carry the underlying error.
    pub fn diagnostics(&self) -> bool {
        !self.is_production()
    }

    pub fn collaborators(&self) -> CollaboratorConfig {
        CollaboratorConfig {
            product_service_url: self.product_service_url.clone(),
            order_service_url: self.order_service_url.clone(),
            inventory_service_url: self.inventory_service_url.clone(),
            timeout: self.http_timeout,
        }
    }

    pub fn settlement(&self) -> SettlementConfig {
        SettlementConfig {
            delay: self.settlement_delay,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let collaborators = CollaboratorConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            service: ServiceMode::default(),
            environment: "development".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            database_url: None,
            product_service_url: collaborators.product_service_url,
            order_service_url: collaborators.order_service_url,
            inventory_service_url: collaborators.inventory_service_url,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            settlement_delay: DEFAULT_SETTLEMENT_DELAY,
        }
    }
}
