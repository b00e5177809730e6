//! Configuration loading
//!
//! `panel.toml` is embedded at build time (build.rs has already validated it
//! on the host). A parse or validation failure at runtime falls back to the
//! built-in defaults rather than halting.

use defmt::*;

use reflex_core::config::PanelConfig;
use reflex_core::config_file::parse_config;

/// Embedded configuration (compiled into firmware)
/// Edit panel.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../panel.toml");

/// Parse the embedded configuration, or fall back to defaults
pub fn load_config() -> PanelConfig {
    let config = match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to parse embedded panel.toml: {:?}", e);
            warn!("Using built-in defaults");
            return PanelConfig::default();
        }
    };

    match config.validate() {
        Ok(()) => {
            info!("Loaded embedded panel.toml");
            config
        }
        Err(e) => {
            warn!("Embedded panel.toml rejected: {:?}", e);
            warn!("Using built-in defaults");
            PanelConfig::default()
        }
    }
}
