use std::{env, str::FromStr, time::Duration};

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cache TTL in seconds (default: 86,400)
    pub cache_ttl_seconds: u64,
    /// Maximum number of in-memory cache entries (default: 10,000)
    pub cache_max_entries: usize,
    /// Retries after a throughput-exceeded response (default: 1)
    pub throughput_retries: u32,
    /// Delay before each throughput retry in milliseconds (default: 1,000)
    pub throughput_backoff_ms: u64,
    /// Capacity of the cache event broadcast channel (default: 256)
    pub event_channel_capacity: usize,
    /// Redis connection URL (default: "redis://localhost:6379")
    /// Note: Only used when the `redis` feature is enabled.
    pub redis_url: String,
    /// Custom DynamoDB endpoint, e.g. DynamoDB Local.
    pub dynamodb_endpoint_url: Option<String>,
    /// AWS region (default: "us-east-1")
    pub aws_region: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DYNALINQ_CACHE_TTL_SECONDS` - Cache TTL in seconds (default: 86,400)
    /// - `DYNALINQ_CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    /// - `DYNALINQ_THROUGHPUT_RETRIES` - Throughput retries (default: 1)
    /// - `DYNALINQ_THROUGHPUT_BACKOFF_MS` - Retry backoff (default: 1,000)
    /// - `DYNALINQ_EVENT_CHANNEL_CAPACITY` - Cache event buffer (default: 256)
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `DYNAMODB_ENDPOINT_URL` - Custom DynamoDB endpoint (default: none)
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a configuration from any variable lookup. Unparseable values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            cache_ttl_seconds: parsed(&lookup, "DYNALINQ_CACHE_TTL_SECONDS").unwrap_or(86_400),
            cache_max_entries: parsed(&lookup, "DYNALINQ_CACHE_MAX_ENTRIES").unwrap_or(10_000),
            throughput_retries: parsed(&lookup, "DYNALINQ_THROUGHPUT_RETRIES").unwrap_or(1),
            throughput_backoff_ms: parsed(&lookup, "DYNALINQ_THROUGHPUT_BACKOFF_MS")
                .unwrap_or(1_000),
            event_channel_capacity: parsed(&lookup, "DYNALINQ_EVENT_CHANNEL_CAPACITY")
                .filter(|v: &usize| *v > 0)
                .unwrap_or(256),
            redis_url: lookup("REDIS_URL")
                .unwrap_or_else(|| "redis://localhost:6379".to_string()),
            dynamodb_endpoint_url: lookup("DYNAMODB_ENDPOINT_URL").filter(|v| !v.is_empty()),
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    /// Get the throughput retry backoff as a Duration.
    pub fn throughput_backoff(&self) -> Duration {
        Duration::from_millis(self.throughput_backoff_ms)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
