// SPDX-License-Identifier: GPL-3.0-only

//! Engine configuration and result types

use crate::backends::camera::{FacingMode, VideoSink};
use crate::backends::decoders::{BackendId, FormatSelection};
use crate::constants::sampling;
use crate::errors::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A decoded payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeResult {
    pub payload: String,
    pub backend: BackendId,
    pub captured_at: DateTime<Utc>,
}

/// Lifecycle of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineState::Idle => "idle",
            EngineState::Starting => "starting",
            EngineState::Running => "running",
            EngineState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// What happens after a decoder hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultMode {
    /// Emit the first hit, then stop
    #[default]
    StopOnce,
    /// Emit the first hit that passes validation, then stop
    StopOnValid,
    /// Emit every hit until stopped
    Continuous,
}

impl std::str::FromStr for ResultMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop-once" | "once" => Ok(ResultMode::StopOnce),
            "stop-on-valid" | "valid" => Ok(ResultMode::StopOnValid),
            "continuous" => Ok(ResultMode::Continuous),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Called with every emitted payload and the backend that read it
pub type ResultCallback = Arc<dyn Fn(&str, BackendId) + Send + Sync>;

/// Called once per fatal condition
pub type ErrorCallback = Arc<dyn Fn(ErrorKind, &str) + Send + Sync>;

/// Called once per tick with a ready frame (width, height, capture time)
pub type HeartbeatCallback = Arc<dyn Fn(u32, u32, DateTime<Utc>) + Send + Sync>;

/// Visual feedback: raised while scanning, cleared on stop
pub type ActivityCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Payload predicate for [`ResultMode::StopOnValid`]
pub type Validator = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Validator accepting exactly `key`
pub fn key_validator(key: impl Into<String>) -> Validator {
    let key = key.into();
    Arc::new(move |payload: &str| payload == key)
}

/// Caller-side hooks
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_result: Option<ResultCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_heartbeat: Option<HeartbeatCallback>,
    pub on_activity: Option<ActivityCallback>,
}

impl Callbacks {
    pub(crate) fn result(&self, payload: &str, backend: BackendId) {
        if let Some(cb) = &self.on_result {
            cb(payload, backend);
        }
    }

    pub(crate) fn error(&self, kind: ErrorKind, message: &str) {
        if let Some(cb) = &self.on_error {
            cb(kind, message);
        }
    }

    pub(crate) fn heartbeat(&self, width: u32, height: u32, at: DateTime<Utc>) {
        if let Some(cb) = &self.on_heartbeat {
            cb(width, height, at);
        }
    }

    pub(crate) fn activity(&self, active: bool) {
        if let Some(cb) = &self.on_activity {
            cb(active);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_result", &self.on_result.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_heartbeat", &self.on_heartbeat.is_some())
            .field("on_activity", &self.on_activity.is_some())
            .finish()
    }
}

/// Parameters of one `start()` call
#[derive(Clone)]
pub struct ScanConfig {
    /// Surface the stream renders into; `None` fails with `NotMounted`
    pub sink: Option<Arc<VideoSink>>,
    /// Requested formats; `None` keeps the engine's current selection
    pub formats: Option<FormatSelection>,
    pub mode: ResultMode,
    /// Explicit predicate; takes precedence over `key`
    pub validator: Option<Validator>,
    /// Expected payload for [`ResultMode::StopOnValid`]
    pub key: Option<String>,
    /// Software sampling rate (samples per second)
    pub target_fps: u32,
    pub facing: FacingMode,
    pub callbacks: Callbacks,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sink: None,
            formats: None,
            mode: ResultMode::default(),
            validator: None,
            key: None,
            target_fps: sampling::DEFAULT_TARGET_FPS,
            facing: FacingMode::default(),
            callbacks: Callbacks::default(),
        }
    }
}

impl ScanConfig {
    /// Config rendering into `sink`, every other field at its default
    pub fn with_sink(sink: &Arc<VideoSink>) -> Self {
        Self {
            sink: Some(Arc::clone(sink)),
            ..Self::default()
        }
    }

    /// Predicate used by the result policy
    ///
    /// An explicit validator wins; otherwise a non-empty key must match
    /// exactly; with neither every payload is valid.
    pub fn effective_validator(&self) -> Option<Validator> {
        if let Some(v) = &self.validator {
            return Some(Arc::clone(v));
        }
        self.key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(key_validator)
    }
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("sink", &self.sink.is_some())
            .field("formats", &self.formats)
            .field("mode", &self.mode)
            .field("validator", &self.validator.is_some())
            .field("key", &self.key)
            .field("target_fps", &self.target_fps)
            .field("facing", &self.facing)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
