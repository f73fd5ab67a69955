// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON config file — a flat object of string keys to string values, loaded
// once at startup. A missing file is replaced by a default one.

use std::path::{Path, PathBuf};

use postwerk_core::Settings;
use postwerk_core::config::RawConfig;
use postwerk_core::error::{PostwerkError, Result};
use tracing::{debug, info, instrument};

const CONFIG_EXTENSION: &str = "json";

/// Result of looking for the config file.
#[derive(Debug)]
pub enum ConfigLoad {
    Loaded(Settings),
    /// No file existed; a default one was written here.
    CreatedDefault(PathBuf),
}

/// `orders` becomes `orders.json`; names that already end in `.json` stay.
pub fn config_path(requested: &Path) -> PathBuf {
    match requested.extension() {
        Some(ext) if ext == CONFIG_EXTENSION => requested.to_path_buf(),
        _ => {
            let mut name = requested.as_os_str().to_owned();
            name.push(".");
            name.push(CONFIG_EXTENSION);
            PathBuf::from(name)
        }
    }
}

/// Load and validate the config at `path`, or write the defaults there.
///
/// Validation failures come back as one `Configuration` error listing every
/// problem.
#[instrument(fields(path = %path.display()))]
pub fn load_settings(path: &Path) -> Result<ConfigLoad> {
    if !path.exists() {
        write_default(path, &home_dir())?;
        return Ok(ConfigLoad::CreatedDefault(path.to_path_buf()));
    }

    let raw = read_raw(path)?;
    let base = path.parent().unwrap_or(Path::new("."));
    let settings = Settings::from_map(&raw)?.with_base_dir(base);
    debug!(?settings, "Configuration loaded");
    Ok(ConfigLoad::Loaded(settings))
}

pub fn read_raw(path: &Path) -> Result<RawConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| PostwerkError::file("read configuration", path, err))?;
    Ok(serde_json::from_str(&text)?)
}

/// Write the first-launch defaults, with both folders set to `home`.
pub fn write_default(path: &Path, home: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| PostwerkError::file("create configuration folder", parent, err))?;
    }
    let json = serde_json::to_string_pretty(&Settings::default_map(home))?;
    std::fs::write(path, json).map_err(|err| PostwerkError::file("write configuration", path, err))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

/// The operator's home folder, where downloads usually land.
fn home_dir() -> PathBuf {
    for var in ["HOME", "USERPROFILE"] {
        if let Some(home) = std::env::var_os(var) {
            return PathBuf::from(home);
        }
    }
    PathBuf::from(".")
}
