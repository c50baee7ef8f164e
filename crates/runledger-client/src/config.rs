use std::time::Duration;

use runledger_core::limits::{
    AttachmentLimits, DEFAULT_MAX_ATTACHMENTS, DEFAULT_MAX_FILE_SIZE, DEFAULT_TIMEOUT,
};

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "https://app.runledger.dev/api/v1";
pub const DEFAULT_GET_RETRIES: u32 = 2;

/// Configuration for [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Versioned API base, e.g. `https://app.runledger.dev/api/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Applied to every request, including the raw file PUT.
    pub timeout: Duration,
    pub max_attachments: usize,
    pub max_file_size: u64,
    /// Extra attempts for idempotent GETs on network errors and 5xx.
    pub get_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
            max_attachments: DEFAULT_MAX_ATTACHMENTS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            get_retries: DEFAULT_GET_RETRIES,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Build from environment variables.
    ///
    /// - `RUNLEDGER_URL`: API base URL
    /// - `RUNLEDGER_API_KEY`: bearer token
    /// - `RUNLEDGER_TIMEOUT_SECS`: request timeout (default 30)
    /// - `RUNLEDGER_MAX_ATTACHMENTS`: attachments per run (default 100)
    /// - `RUNLEDGER_MAX_FILE_SIZE`: bytes per attachment (default 10 MiB)
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("RUNLEDGER_URL") {
            config.base_url = url;
        }
        config.api_key = std::env::var("RUNLEDGER_API_KEY").ok().filter(|k| !k.is_empty());
        if let Some(secs) = parse_env::<u64>("RUNLEDGER_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(max) = parse_env::<usize>("RUNLEDGER_MAX_ATTACHMENTS")? {
            config.max_attachments = max;
        }
        if let Some(max) = parse_env::<u64>("RUNLEDGER_MAX_FILE_SIZE")? {
            config.max_file_size = max;
        }
        Ok(config)
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attachments(mut self, max: usize) -> Self {
        self.max_attachments = max;
        self
    }

    pub fn with_max_file_size(mut self, max: u64) -> Self {
        self.max_file_size = max;
        self
    }

    pub fn with_get_retries(mut self, retries: u32) -> Self {
        self.get_retries = retries;
        self
    }

    pub fn limits(&self) -> AttachmentLimits {
        AttachmentLimits {
            max_count: self.max_attachments,
            max_file_size: self.max_file_size,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ClientError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| ClientError::Config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}
