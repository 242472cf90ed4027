// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scan engine
//!
//! Errors fall into two groups. Fatal conditions ([`ScanError`]) end the
//! current `start()` call and reach the caller exactly once through the
//! error callback. Per-attempt decode failures ([`DecodeError`]) are local
//! to one backend and one tick; the chain absorbs them as "no result".

use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Classification reported to the error callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// `start()` called without a video sink
    NotMounted,
    /// The platform refused camera access
    PermissionDenied,
    /// No usable capture device
    DeviceUnavailable,
    /// A requested format has no usable backend
    BackendUnavailable,
    /// Every requested format ended up without a backend
    NoDecoderAvailable,
    /// A single decode attempt failed (never surfaced)
    DecodeAttemptFailed,
    /// Invalid configuration
    Config,
}

impl ErrorKind {
    /// Stable identifier, used in CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotMounted => "not_mounted",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::DeviceUnavailable => "device_unavailable",
            ErrorKind::BackendUnavailable => "backend_unavailable",
            ErrorKind::NoDecoderAvailable => "no_decoder_available",
            ErrorKind::DecodeAttemptFailed => "decode_attempt_failed",
            ErrorKind::Config => "config",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-level error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// No sink configured
    NotMounted,
    /// Camera acquisition failed
    Camera(CameraError),
    /// None of the requested formats has a usable backend
    NoDecoderAvailable(String),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Io(String),
}

/// Camera acquisition errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Access to the device was refused
    PermissionDenied(String),
    /// Device missing, busy, or unable to stream
    DeviceUnavailable(String),
}

/// Failure of a single decode attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The reader raised an error
    Failed(String),
    /// The reader returned data that is not a usable payload
    Malformed(String),
}

impl ScanError {
    /// Error classification for the error callback
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::NotMounted => ErrorKind::NotMounted,
            ScanError::Camera(CameraError::PermissionDenied(_)) => ErrorKind::PermissionDenied,
            ScanError::Camera(CameraError::DeviceUnavailable(_)) => ErrorKind::DeviceUnavailable,
            ScanError::NoDecoderAvailable(_) => ErrorKind::NoDecoderAvailable,
            ScanError::Config(_) | ScanError::Io(_) => ErrorKind::Config,
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::NotMounted => write!(f, "No video sink mounted; configure a sink before start"),
            ScanError::Camera(e) => write!(f, "Camera error: {}", e),
            ScanError::NoDecoderAvailable(msg) => write!(f, "No decoder available: {}", msg),
            ScanError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ScanError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            CameraError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Failed(msg) => write!(f, "Decode failed: {}", msg),
            DecodeError::Malformed(msg) => write!(f, "Malformed payload: {}", msg),
        }
    }
}

impl std::error::Error for ScanError {}
impl std::error::Error for CameraError {}
impl std::error::Error for DecodeError {}

impl From<CameraError> for ScanError {
    fn from(err: CameraError) -> Self {
        ScanError::Camera(err)
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(err.to_string()),
            _ => CameraError::DeviceUnavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_kinds() {
        let denied: ScanError = CameraError::PermissionDenied("nope".into()).into();
        assert_eq!(denied.kind(), ErrorKind::PermissionDenied);

        let missing: ScanError = CameraError::DeviceUnavailable("gone".into()).into();
        assert_eq!(missing.kind(), ErrorKind::DeviceUnavailable);
    }

    #[test]
    fn test_io_permission_maps_to_permission_denied() {
        let io = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(CameraError::from(io), CameraError::PermissionDenied(_)));

        let io = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(CameraError::from(io), CameraError::DeviceUnavailable(_)));
    }

    #[test]
    fn test_not_mounted_message() {
        assert_eq!(ScanError::NotMounted.kind(), ErrorKind::NotMounted);
        assert!(ScanError::NotMounted.to_string().contains("sink"));
    }
}
