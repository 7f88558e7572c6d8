//! Layered configuration loading: defaults, TOML file, environment

use crate::config::ScreenConfig;
use crate::errors::{ScreenError, ScreenResult};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "screen.toml";
pub const CONFIG_PATH_VAR: &str = "DOPANT_SCREEN_CONFIG";
pub const ENV_PREFIX: &str = "SCREEN_";

/// Config file candidates, lowest precedence first.
///
/// An explicit path replaces the search entirely.
pub fn config_sources(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
        if !path.trim().is_empty() {
            return vec![PathBuf::from(path)];
        }
    }

    let mut sources = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        sources.push(dir.join("dopant_screen").join(CONFIG_FILE));
    }
    sources.push(PathBuf::from(CONFIG_FILE));
    sources
}

pub fn figment_for(explicit: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(ScreenConfig::default()));
    for source in config_sources(explicit) {
        figment = figment.merge(Toml::file(source));
    }
    // SCREEN_SURROGATE__RESTARTS=20 -> surrogate.restarts
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Defaults, then TOML, then `SCREEN_` environment overrides.
pub fn load_config(explicit: Option<&Path>) -> ScreenResult<ScreenConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ScreenError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
    }

    let config: ScreenConfig = figment_for(explicit)
        .extract()
        .map_err(|e| ScreenError::config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
