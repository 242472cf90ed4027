// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON under the user's config directory. Every field has a
//! default, so partial files are fine and a missing file means defaults.

use crate::backends::camera::{FacingMode, VideoSink};
use crate::backends::decoders::FormatSelection;
use crate::constants::{capture, sampling};
use crate::engine::{Callbacks, ResultMode, ScanConfig};
use crate::errors::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "codescan";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Symbologies to scan for
    pub formats: FormatSelection,
    /// What happens after a hit
    pub mode: ResultMode,
    /// Expected payload in stop-on-valid mode; empty accepts everything
    pub key: Option<String>,
    /// Software sampling rate (samples per second)
    pub target_fps: u32,
    /// Preferred camera direction
    pub facing: FacingMode,
    /// V4L2 capture node
    pub device_path: String,
    /// Report per-tick frame dimensions
    pub heartbeat: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            formats: FormatSelection::Auto,
            mode: ResultMode::StopOnce,
            key: None,
            target_fps: sampling::DEFAULT_TARGET_FPS,
            facing: FacingMode::Environment,
            device_path: capture::DEFAULT_DEVICE.to_string(),
            heartbeat: false,
        }
    }
}

impl Config {
    /// `<config dir>/codescan/config.json`, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> ScanResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> ScanResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> ScanResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> ScanResult<()> {
        if self.target_fps == 0 {
            return Err(ScanError::Config("target_fps must be greater than zero".into()));
        }
        if self.device_path.trim().is_empty() {
            return Err(ScanError::Config("device_path must not be empty".into()));
        }
        Ok(())
    }

    /// Engine parameters for one scan rendering into `sink`
    pub fn to_scan_config(&self, sink: &Arc<VideoSink>, callbacks: Callbacks) -> ScanConfig {
        ScanConfig {
            sink: Some(Arc::clone(sink)),
            formats: Some(self.formats.clone()),
            mode: self.mode,
            validator: None,
            key: self.key.clone(),
            target_fps: self.target_fps,
            facing: self.facing,
            callbacks: Callbacks {
                on_heartbeat: callbacks.on_heartbeat.filter(|_| self.heartbeat),
                ..callbacks
            },
        }
    }
}
