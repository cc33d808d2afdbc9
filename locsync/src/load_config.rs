//! `load_config`: locate, parse and validate the YAML configuration.
//!
//! This is the only place untrusted YAML is parsed. The result is the typed
//! [`locsync_core::config::Config`] the core services consume.
//!
//! # Lookup order
//! 1. an explicit `--config` path;
//! 2. `.locsync.yaml` in the working directory or any of its ancestors;
//! 3. `~/.locsync/config.yaml`.
//!
//! `LOCSYNC_ACCESS_TOKEN` (from the environment or a `.env` file) overrides
//! `workspace.access_token`, so the token can stay out of the YAML.
//!
//! # Errors
//! Every failure is an `anyhow::Error` naming the file involved.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info};

use locsync_core::config::Config;
use locsync_core::local::APP_HOME_DIR;

pub const PROJECT_CONFIG_FILE: &str = ".locsync.yaml";
pub const HOME_CONFIG_FILE: &str = "config.yaml";
pub const ACCESS_TOKEN_ENV: &str = "LOCSYNC_ACCESS_TOKEN";

/// Resolves which config file to read.
pub fn discover_config(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    if let Some(found) = cwd
        .ancestors()
        .map(|dir| dir.join(PROJECT_CONFIG_FILE))
        .find(|candidate| candidate.is_file())
    {
        debug!(config_path = %found.display(), "Found project config");
        return Ok(found);
    }
    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(APP_HOME_DIR).join(HOME_CONFIG_FILE);
        if candidate.is_file() {
            debug!(config_path = %candidate.display(), "Using config from app home");
            return Ok(candidate);
        }
    }
    error!("No configuration file found");
    Err(anyhow!(
        "No configuration found: pass --config, add {PROJECT_CONFIG_FILE} to the project, or create ~/{APP_HOME_DIR}/{HOME_CONFIG_FILE}"
    ))
}

/// Discovers, loads and validates the configuration.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = discover_config(explicit)?;
    load_config_file(path)
}

/// Loads one YAML file, applies the environment override and validates it.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut config: Config = match serde_yaml::from_str(&content) {
        Ok(config) => config,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
        if !token.trim().is_empty() {
            debug!("Access token taken from {}", ACCESS_TOKEN_ENV);
            config.workspace.access_token = token;
        }
    }

    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path_ref.display()))?;
    config.trace_loaded();
    Ok(config)
}
