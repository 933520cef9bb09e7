use std::time::Duration;

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Purpose |
/// |----------|---------|---------|
/// | HTTP_PORT | 8080 | HTTP listen port |
/// | PAYMENT_BASE_URL | http://localhost:9100 | Payment provider API |
/// | INVENTORY_BASE_URL | http://localhost:9200 | Inventory service API |
/// | NOTIFICATION_BASE_URL | http://localhost:9300 | Notification service API |
/// | WEBHOOK_SECRET | whsec_dev | Shared secret for webhook signatures |
/// | WEBHOOK_TIMEOUT_MS | 30000 | Wait for a webhook before polling |
/// | PAYMENT_RETRY_MAX_ATTEMPTS | 3 | Provider call budget per operation |
/// | PAYMENT_RETRY_BASE_DELAY_MS | 200 | First backoff step |
/// | LEDGER_RETENTION_MS | 86400000 | Idempotency record lifetime (24h) |
/// | LEDGER_WAIT_MS | 5000 | Bounded wait on a concurrent key holder |
/// | REQUEST_TIMEOUT_MS | 10000 | Outbound HTTP timeout |
/// | ENVIRONMENT | development | development \| staging \| production |
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API listen port
    pub http_port: u16,
    /// Payment provider base URL
    pub payment_base_url: String,
    /// Inventory service base URL
    pub inventory_base_url: String,
    /// Notification service base URL
    pub notification_base_url: String,
    /// Shared secret for webhook signature verification
    pub webhook_secret: String,
    /// How long to wait for a webhook before polling the provider
    pub webhook_timeout_ms: u64,
    /// Maximum provider calls per operation (initial + retries)
    pub payment_retry_max_attempts: u32,
    /// Backoff for the first retry; doubles per retry after that
    pub payment_retry_base_delay_ms: u64,
    /// Idempotency record retention window
    pub ledger_retention_ms: u64,
    /// Bounded wait when another request holds the same key
    pub ledger_wait_ms: u64,
    /// Timeout on outbound HTTP calls
    pub request_timeout_ms: u64,
    /// Runtime environment: development | staging | production
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults.
    pub fn from_env() -> Self {
        Self {
            http_port: env_parsed("HTTP_PORT", 8080),
            payment_base_url: env_or("PAYMENT_BASE_URL", "http://localhost:9100"),
            inventory_base_url: env_or("INVENTORY_BASE_URL", "http://localhost:9200"),
            notification_base_url: env_or("NOTIFICATION_BASE_URL", "http://localhost:9300"),
            webhook_secret: env_or("WEBHOOK_SECRET", "whsec_dev"),
            webhook_timeout_ms: env_parsed("WEBHOOK_TIMEOUT_MS", 30_000),
            payment_retry_max_attempts: env_parsed("PAYMENT_RETRY_MAX_ATTEMPTS", 3),
            payment_retry_base_delay_ms: env_parsed("PAYMENT_RETRY_BASE_DELAY_MS", 200),
            ledger_retention_ms: env_parsed("LEDGER_RETENTION_MS", 86_400_000),
            ledger_wait_ms: env_parsed("LEDGER_WAIT_MS", 5_000),
            request_timeout_ms: env_parsed("REQUEST_TIMEOUT_MS", 10_000),
            environment: env_or("ENVIRONMENT", "development"),
        }
    }

    /// Override collaborator endpoints and timings, for tests
    pub fn with_overrides(
        payment_base_url: impl Into<String>,
        inventory_base_url: impl Into<String>,
        notification_base_url: impl Into<String>,
    ) -> Self {
        let mut config = Self::from_env();
        config.payment_base_url = payment_base_url.into();
        config.inventory_base_url = inventory_base_url.into();
        config.notification_base_url = notification_base_url.into();
        config
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.payment_retry_base_delay_ms)
    }

    pub fn ledger_retention(&self) -> Duration {
        Duration::from_millis(self.ledger_retention_ms)
    }

    pub fn ledger_wait(&self) -> Duration {
        Duration::from_millis(self.ledger_wait_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
