//! Startup configuration.
//!
//! Settings come from up to four layers, later ones winning:
//! built-in defaults < TOML file < process environment < command line.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_SEND_TIMEOUT;
use crate::error::StartupError;

/// `host:port` of the host's invocation endpoint.
pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
/// Name of the registered handler to run.
pub const HANDLER_ENV: &str = "LAMBDA_HANDLER";
/// Debug telemetry switch; only the exact value `1` enables it.
pub const DEBUG_ENV: &str = "LAMBDA_RUNTIME_DEBUG";
/// Timeout in milliseconds for posting results and error reports.
pub const SEND_TIMEOUT_ENV: &str = "LAMBDA_RUNTIME_SEND_TIMEOUT_MS";
/// Path of an optional TOML configuration file.
pub const CONFIG_FILE_ENV: &str = "LAMBDA_RUNTIME_CONFIG";

pub const DEFAULT_HANDLER: &str = "handler";

/// One layer of settings. Unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuntimeSettings {
    pub runtime_api: Option<String>,
    pub handler: Option<String>,
    pub debug: Option<bool>,
    pub send_timeout_ms: Option<u64>,
}

impl RuntimeSettings {
    /// Built-in defaults. The endpoint has none.
    pub fn defaults() -> Self {
        Self {
            runtime_api: None,
            handler: Some(DEFAULT_HANDLER.to_string()),
            debug: Some(false),
            send_timeout_ms: Some(DEFAULT_SEND_TIMEOUT.as_millis() as u64),
        }
    }

    /// Read settings from the environment through `lookup`. Empty values count as unset.
    pub fn from_env_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let send_timeout_ms = get(SEND_TIMEOUT_ENV)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| {
                    StartupError::config(format!(
                        "{} must be a number of milliseconds, got '{}'",
                        SEND_TIMEOUT_ENV, raw
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            runtime_api: get(RUNTIME_API_ENV),
            handler: get(HANDLER_ENV),
            debug: get(DEBUG_ENV).map(|v| v == "1"),
            send_timeout_ms,
        })
    }

    /// Read settings from the process environment.
    pub fn from_process_env() -> Result<Self, StartupError> {
        Self::from_env_lookup(|key| std::env::var(key).ok())
    }

    /// Load a TOML settings file.
    pub fn load_file(path: &Path) -> Result<Self, StartupError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StartupError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| StartupError::config(format!("cannot parse {}: {}", path.display(), e)))
    }
}

/// Merge layers in order. Later layers have higher precedence.
/// Use this as `merge_all(&[defaults, file, env, cli])`.
pub fn merge_all(layers: &[RuntimeSettings]) -> RuntimeSettings {
    layers
        .iter()
        .cloned()
        .reduce(merge_settings)
        .unwrap_or_default()
}

/// Merge two layers, preferring values from `primary` over `fallback`.
pub fn merge_settings(fallback: RuntimeSettings, primary: RuntimeSettings) -> RuntimeSettings {
    RuntimeSettings {
        runtime_api: primary.runtime_api.or(fallback.runtime_api),
        handler: primary.handler.or(fallback.handler),
        debug: primary.debug.or(fallback.debug),
        send_timeout_ms: primary.send_timeout_ms.or(fallback.send_timeout_ms),
    }
}

/// Fully resolved configuration the bootstrap runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub endpoint: String,
    pub handler: String,
    pub debug: bool,
    pub send_timeout: Duration,
}

impl RuntimeConfig {
    /// Resolve merged settings, failing when no endpoint was supplied.
    pub fn from_settings(settings: RuntimeSettings) -> Result<Self, StartupError> {
        let endpoint = settings
            .runtime_api
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                StartupError::config(format!("{} environment variable is not set", RUNTIME_API_ENV))
            })?;

        Ok(Self {
            endpoint,
            handler: settings
                .handler
                .unwrap_or_else(|| DEFAULT_HANDLER.to_string()),
            debug: settings.debug.unwrap_or(false),
            send_timeout: settings
                .send_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SEND_TIMEOUT),
        })
    }
}
