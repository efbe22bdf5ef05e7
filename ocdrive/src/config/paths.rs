use std::env;
use std::path::{Path, PathBuf};

use crate::types::{PathConfig, PathConfigType};

/// File name looked up in the working tree
pub const LOCAL_CONFIG_FILE: &str = "ocdrive.config.yaml";

/// Get the global config directory (~/.config/ocdrive or $XDG_CONFIG_HOME/ocdrive)
pub fn get_global_config_dir() -> PathBuf {
    let base = if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config")
    } else {
        PathBuf::from(".config")
    };
    base.join("ocdrive")
}

/// Walk up from start_dir looking for ocdrive.config.yaml
pub fn find_local_config(start_dir: Option<&Path>) -> Option<PathBuf> {
    let start = match start_dir {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir().ok()?,
    };

    let mut dir = start.as_path();
    loop {
        let config_path = dir.join(LOCAL_CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        match dir.parent() {
            Some(parent) if parent != dir => dir = parent,
            _ => break,
        }
    }

    None
}

/// Resolve the config file location.
/// Priority: local config (walk up tree) > global config
pub fn resolve_paths() -> PathConfig {
    resolve_paths_from(None)
}

pub fn resolve_paths_from(start_dir: Option<&Path>) -> PathConfig {
    if let Some(local_config) = find_local_config(start_dir) {
        return PathConfig {
            config_type: PathConfigType::Local,
            config_path: local_config.to_string_lossy().to_string(),
        };
    }

    PathConfig {
        config_type: PathConfigType::Global,
        config_path: get_global_config_dir()
            .join("config.yaml")
            .to_string_lossy()
            .to_string(),
    }
}
