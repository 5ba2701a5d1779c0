//! Configuration loading and synthesis endpoint resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Default synthesis service endpoint when nothing else is configured.
pub const DEFAULT_SYNTHESIS_URL: &str = "http://127.0.0.1:8765/synthesize";

/// Synthesis endpoint resolution, priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable `LECTOR_SYNTHESIS_URL`
/// 3. TOML config file (`synthesis_url` key)
/// 4. Compiled default (fallback)
pub fn resolve_synthesis_url(cli_arg: Option<&str>) -> String {
    // Priority 1: Command-line argument
    if let Some(url) = cli_arg {
        return url.to_string();
    }

    // Priority 2: Environment variable
    if let Ok(url) = std::env::var("LECTOR_SYNTHESIS_URL") {
        return url;
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = load_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(url) = config.get("synthesis_url").and_then(|v| v.as_str()) {
                    return url.to_string();
                }
            }
        }
    }

    // Priority 4: Compiled default
    DEFAULT_SYNTHESIS_URL.to_string()
}

/// Get the configuration file path for the platform
fn load_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/lector/config.toml first, then /etc/lector/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("lector").join("config.toml"));
        let system_config = PathBuf::from("/etc/lector/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let config_path = dirs::config_dir()
        .map(|d| d.join("lector").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if config_path.exists() {
        Ok(config_path)
    } else {
        Err(Error::Config(format!(
            "Config file not found: {:?}",
            config_path
        )))
    }
}
