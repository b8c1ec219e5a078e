mod settings;
pub mod state;

pub use settings::{Config, IssuerSettings, PrintSettings, ServerSettings};
pub use state::{Counter, Ledger, State};

use crate::error::{BillingError, Result};
use directories::ProjectDirs;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Get the config directory path (XDG config dir, or ~/.meter/)
pub fn config_dir() -> Result<PathBuf> {
    if let Some(proj_dirs) = ProjectDirs::from("", "", "meter") {
        return Ok(proj_dirs.config_dir().to_path_buf());
    }

    let home = dirs_home().ok_or_else(|| {
        BillingError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine home directory",
        ))
    })?;

    Ok(home.join(".meter"))
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Expand ~ in paths
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Output directory from config; relative paths live under the config dir.
pub fn resolve_output_dir(output_dir: &str, cfg_dir: &Path) -> PathBuf {
    let expanded = expand_path(output_dir);
    if expanded.is_absolute() {
        expanded
    } else {
        cfg_dir.join(expanded)
    }
}

/// Load the main config.toml
pub fn load_config(config_dir: &Path) -> Result<Config> {
    if !config_dir.exists() {
        return Err(BillingError::ConfigNotFound(config_dir.to_path_buf()));
    }
    let path = config_dir.join("config.toml");
    if !path.exists() {
        return Err(BillingError::ConfigFileNotFound(path));
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| BillingError::ConfigParse { path, source: e })
}

/// Load state.toml (creates default if missing)
pub fn load_state(config_dir: &Path) -> Result<State> {
    if !config_dir.exists() {
        return Err(BillingError::ConfigNotFound(config_dir.to_path_buf()));
    }
    let path = config_dir.join("state.toml");
    if !path.exists() {
        return Ok(State::default());
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| BillingError::ConfigParse { path, source: e })
}

/// Save state.toml
pub fn save_state(config_dir: &Path, state: &State) -> Result<()> {
    let path = config_dir.join("state.toml");
    let content = toml::to_string_pretty(state)?;
    fs::write(&path, content)?;
    debug!(path = %path.display(), movements = state.movements.len(), "saved state");
    Ok(())
}

/// Exclusive claim on a config directory's state, held across a slow
/// load-modify-save cycle so another process cannot overwrite it midway.
/// The lock file is removed when this is dropped.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), "failed to remove state lock: {e}");
        }
    }
}

/// Take the state lock, failing with [`BillingError::StateLocked`] while
/// another holder exists.
pub fn lock_state(config_dir: &Path) -> Result<StateLock> {
    if !config_dir.exists() {
        return Err(BillingError::ConfigNotFound(config_dir.to_path_buf()));
    }
    let path = config_dir.join("state.lock");
    match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(_) => Ok(StateLock { path }),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(BillingError::StateLocked(path)),
        Err(e) => Err(e.into()),
    }
}

/// Template content for config.toml
pub const CONFIG_TEMPLATE: &str = r#"[issuer]
name = "Al-Faqih Station - Electricity & Water Branch"

[server]
url = "http://localhost:8000"
# rpc_method = "electricity_meter_management.electricity_meter_management.doctype.meter_movement.meter_movement.get_customers_for_meter_movement"
# api_key = "your-api-key"        # optional, sent as 'token key:secret'
# api_secret = "your-api-secret"
timeout_secs = 10

[print]
output_dir = "output"   # relative to this directory, or absolute / ~/...
delay_ms = 500          # pause before the print dialog is requested
# payment_note = "Please pay within two days of receiving this bill"
"#;
