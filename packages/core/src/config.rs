/// Runtime configuration for the tracker services
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for the sequence cache TTL; the cache only skips the
/// counter healing check, so it is kept short.
const MAX_SEQUENCE_CACHE_TTL_SECS: u64 = 60;

/// Configuration shared by the sequence counter and the batch orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoreConfig {
    /// Items per chunk when a batch call does not specify one
    pub batch_size: usize,

    /// Largest chunk size a caller may request
    pub max_batch_size: usize,

    /// Whether batches keep going after a failed item by default
    pub continue_on_error: bool,

    /// How long a verified counter stays exempt from the healing check (0 disables)
    pub sequence_cache_ttl_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_batch_size: 100,
            continue_on_error: true,
            sequence_cache_ttl_secs: 10,
        }
    }
}

impl CoreConfig {
    /// Defaults overlaid with `TRACKER_*` environment variables
    ///
    /// Recognised variables: `TRACKER_BATCH_SIZE`, `TRACKER_MAX_BATCH_SIZE`,
    /// `TRACKER_CONTINUE_ON_ERROR`, `TRACKER_SEQUENCE_CACHE_TTL_SECS`.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse a JSON configuration document; absent keys keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| format!("invalid config JSON: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        fn parse<T: std::str::FromStr>(key: &str, raw: String) -> Result<T, String> {
            raw.trim()
                .parse()
                .map_err(|_| format!("{} has invalid value '{}'", key, raw))
        }

        let mut config = Self::default();
        if let Some(raw) = lookup("TRACKER_BATCH_SIZE") {
            config.batch_size = parse("TRACKER_BATCH_SIZE", raw)?;
        }
        if let Some(raw) = lookup("TRACKER_MAX_BATCH_SIZE") {
            config.max_batch_size = parse("TRACKER_MAX_BATCH_SIZE", raw)?;
        }
        if let Some(raw) = lookup("TRACKER_CONTINUE_ON_ERROR") {
            config.continue_on_error = parse("TRACKER_CONTINUE_ON_ERROR", raw)?;
        }
        if let Some(raw) = lookup("TRACKER_SEQUENCE_CACHE_TTL_SECS") {
            config.sequence_cache_ttl_secs = parse("TRACKER_SEQUENCE_CACHE_TTL_SECS", raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn sequence_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.sequence_cache_ttl_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }

        if self.max_batch_size < self.batch_size {
            return Err(format!(
                "max_batch_size ({}) cannot be smaller than batch_size ({})",
                self.max_batch_size, self.batch_size
            ));
        }

        if self.sequence_cache_ttl_secs > MAX_SEQUENCE_CACHE_TTL_SECS {
            return Err(format!(
                "sequence_cache_ttl_secs cannot exceed {}",
                MAX_SEQUENCE_CACHE_TTL_SECS
            ));
        }

        Ok(())
    }
}
