//! Assembles a [`RunConfig`] from config files, environment and flags.
//!
//! Layers are merged in increasing priority:
//! `.site-sync.yaml` in the source directory, then the `--config` file, then
//! `SITE_SYNC_*` environment variables, then command-line flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
pub use site_sync_core::config::RC_FILE_NAME;
use site_sync_core::config::{RunConfig, SyncOptions};
use tracing::{debug, error, info};

pub const ENV_PREFIX: &str = "SITE_SYNC_";

/// Read one YAML (or JSON) options file.
///
/// Credentials are refused here; they only come from the environment.
pub fn read_options_file<P: AsRef<Path>>(path: P) -> Result<SyncOptions> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(e).with_context(|| format!("Failed to read config file {path_ref:?}"));
        }
    };

    // An empty file deserializes to YAML null rather than an empty map.
    if content.trim().is_empty() {
        return Ok(SyncOptions::default());
    }

    match serde_yaml::from_str::<SyncOptions>(&content) {
        Ok(options) => {
            if options.access_key_id.is_some() || options.secret_access_key.is_some() {
                error!(config_path = ?path_ref, "Config file contains credentials");
                bail!(
                    "Config file {path_ref:?} must not contain access_key_id or secret_access_key; \
                     use SITE_SYNC_ACCESS_KEY_ID and SITE_SYNC_SECRET_ACCESS_KEY instead"
                );
            }
            debug!(config_path = ?path_ref, "Parsed config file");
            Ok(options)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(e).with_context(|| format!("Failed to parse config file {path_ref:?}"))
        }
    }
}

/// Build an options layer from `SITE_SYNC_*` variables. Unrelated variables
/// are ignored, as are empty values.
pub fn options_from_env<I, K, V>(vars: I) -> SyncOptions
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut options = SyncOptions::default();
    for (name, value) in vars {
        let Some(field) = name.as_ref().strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let value: String = value.into();
        if value.is_empty() {
            continue;
        }
        let slot = match field {
            "BUCKET" => &mut options.bucket,
            "DISTRIBUTION_ID" => &mut options.distribution_id,
            "KEY_PREFIX" => &mut options.key_prefix,
            "ACL" => &mut options.acl,
            "REGION" => &mut options.region,
            "ENDPOINT_URL" => &mut options.endpoint_url,
            "ACCESS_KEY_ID" => &mut options.access_key_id,
            "SECRET_ACCESS_KEY" => &mut options.secret_access_key,
            _ => continue,
        };
        debug!(variable = %name.as_ref(), "Option taken from environment");
        *slot = Some(value);
    }
    options
}

/// Merge every layer and validate the result.
///
/// `flags` is the command-line layer; `env` is usually `std::env::vars()`.
pub fn load_config<I>(flags: SyncOptions, config_path: Option<&Path>, env: I) -> Result<RunConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    let explicit = match config_path {
        Some(path) => read_options_file(path)?,
        None => SyncOptions::default(),
    };
    let env_layer = options_from_env(env);
    let upper = explicit.merge(env_layer).merge(flags);

    let rc_layer = match rc_file_path(&upper) {
        Some(path) if path.is_file() => read_options_file(&path)?,
        _ => SyncOptions::default(),
    };

    let merged = rc_layer.merge(upper);
    let config = RunConfig::from_options(merged).context("Invalid configuration")?;
    info!(
        bucket = %config.bucket(),
        distribution_id = config.distribution_id().unwrap_or("-"),
        "Config loaded and merged successfully"
    );
    Ok(config)
}

fn rc_file_path(options: &SyncOptions) -> Option<PathBuf> {
    options
        .source_directory
        .as_ref()
        .map(|dir| dir.join(RC_FILE_NAME))
}
