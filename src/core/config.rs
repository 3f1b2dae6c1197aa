//! Runtime configuration shared by the adapters and services.

use crate::core::domain::error::{ControlPlaneResult, ValidationError};
use std::time::Duration;

/// Default name of both the folder and the project new instances fall back to.
pub const DEFAULT_PROJECT_NAME: &str = "Interne";

/// Token-bucket limit applied to each cluster's API client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Tunables for reconciliation, lifecycle calls and the hypervisor clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPlaneConfig {
    /// Outbound request budget per cluster. `None` disables limiting.
    pub rate_limit: Option<RateLimitConfig>,
    /// Upper bound on concurrent node syncs per cluster and instance syncs per node.
    pub sync_concurrency: usize,
    /// Accept self-signed hypervisor certificates.
    pub accept_invalid_certs: bool,
    pub request_timeout: Duration,
    pub default_folder_name: String,
    pub default_project_name: String,
    /// Storage pool for boot disks of new instances.
    pub default_storage: String,
    /// Attempts at allocate-id-then-create when the id gets taken in between.
    pub create_attempts: u32,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            rate_limit: None,
            sync_concurrency: 8,
            accept_invalid_certs: false,
            request_timeout: Duration::from_secs(30),
            default_folder_name: DEFAULT_PROJECT_NAME.to_string(),
            default_project_name: DEFAULT_PROJECT_NAME.to_string(),
            default_storage: "local-lvm".to_string(),
            create_attempts: 3,
        }
    }
}

impl ControlPlaneConfig {
    /// Overlays `LEECA_*` environment variables on the defaults.
    ///
    /// Recognized variables: `LEECA_SYNC_CONCURRENCY`, `LEECA_RATE_LIMIT_RPS`,
    /// `LEECA_RATE_LIMIT_BURST`, `LEECA_ACCEPT_INVALID_CERTS`,
    /// `LEECA_REQUEST_TIMEOUT_SECS`, `LEECA_DEFAULT_FOLDER`,
    /// `LEECA_DEFAULT_PROJECT`, `LEECA_DEFAULT_STORAGE`, `LEECA_CREATE_ATTEMPTS`.
    pub fn from_env() -> ControlPlaneResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> ControlPlaneResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("LEECA_SYNC_CONCURRENCY") {
            config.sync_concurrency = parse_var("LEECA_SYNC_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("LEECA_ACCEPT_INVALID_CERTS") {
            config.accept_invalid_certs = parse_var("LEECA_ACCEPT_INVALID_CERTS", &value)?;
        }
        if let Some(value) = lookup("LEECA_REQUEST_TIMEOUT_SECS") {
            config.request_timeout =
                Duration::from_secs(parse_var("LEECA_REQUEST_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("LEECA_DEFAULT_FOLDER") {
            config.default_folder_name = value;
        }
        if let Some(value) = lookup("LEECA_DEFAULT_PROJECT") {
            config.default_project_name = value;
        }
        if let Some(value) = lookup("LEECA_DEFAULT_STORAGE") {
            config.default_storage = value;
        }
        if let Some(value) = lookup("LEECA_CREATE_ATTEMPTS") {
            config.create_attempts = parse_var("LEECA_CREATE_ATTEMPTS", &value)?;
        }

        config.rate_limit = match (
            lookup("LEECA_RATE_LIMIT_RPS"),
            lookup("LEECA_RATE_LIMIT_BURST"),
        ) {
            (None, None) => None,
            (Some(rps), burst) => {
                let requests_per_second = parse_var("LEECA_RATE_LIMIT_RPS", &rps)?;
                let burst_size = match burst {
                    Some(burst) => parse_var("LEECA_RATE_LIMIT_BURST", &burst)?,
                    None => requests_per_second,
                };
                Some(RateLimitConfig {
                    requests_per_second,
                    burst_size,
                })
            }
            (None, Some(_)) => {
                return Err(ValidationError::Field {
                    field: "LEECA_RATE_LIMIT_BURST".to_string(),
                    message: "requires LEECA_RATE_LIMIT_RPS".to_string(),
                }
                .into());
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the services rely on.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sync_concurrency == 0 {
            return Err(ValidationError::ConstraintViolation(
                "sync_concurrency must be at least 1".to_string(),
            ));
        }
        if self.create_attempts == 0 {
            return Err(ValidationError::ConstraintViolation(
                "create_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(limit) = self.rate_limit {
            if limit.requests_per_second == 0 || limit.burst_size == 0 {
                return Err(ValidationError::ConstraintViolation(
                    "rate limit values must be greater than 0".to_string(),
                ));
            }
        }
        if self.default_project_name.trim().is_empty() || self.default_folder_name.trim().is_empty()
        {
            return Err(ValidationError::ConstraintViolation(
                "default folder and project names cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ValidationError> {
    value.trim().parse().map_err(|_| ValidationError::Field {
        field: key.to_string(),
        message: format!("cannot parse {:?}", value),
    })
}
