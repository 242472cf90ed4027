// SPDX-License-Identifier: GPL-3.0-only

//! Decoder backends
//!
//! Every way of turning a frame into a payload sits behind
//! [`DecoderBackend`]. Three variants exist:
//!
//! - [`NativeDetector`]: a host-provided multi-format detector
//! - [`SoftDecoder`] for QR, backed by `rqrr`
//! - [`SoftDecoder`] for Code 39, a scanline reader run off the async runtime
//!
//! Backends are built fresh for every `start()`; their readiness never
//! leaves `Unavailable` once it gets there.

pub mod code39;
pub mod native;
pub mod qr;
pub mod soft;

pub use code39::Code39Reader;
pub use native::{DetectedBarcode, NativeBarcodePlatform, NativeDetector};
pub use qr::RqrrReader;
pub use soft::SoftDecoder;

use crate::backends::camera::Frame;
use crate::errors::DecodeError;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use tokio::sync::OnceCell;

/// A barcode encoding standard
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Symbology {
    /// QR Code
    Qr,
    /// Code 39
    Code39,
}

impl Symbology {
    /// Every symbology the engine knows about
    pub const ALL: [Symbology; 2] = [Symbology::Qr, Symbology::Code39];

    /// Short identifier used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Qr => "qr",
            Symbology::Code39 => "code39",
        }
    }

    /// Identifier used by platform barcode detectors
    pub fn native_name(&self) -> &'static str {
        match self {
            Symbology::Qr => "qr_code",
            Symbology::Code39 => "code_39",
        }
    }

    /// Parse a platform detector identifier
    pub fn from_native_name(name: &str) -> Option<Self> {
        match name {
            "qr_code" => Some(Symbology::Qr),
            "code_39" => Some(Symbology::Code39),
            _ => None,
        }
    }
}

impl std::fmt::Display for Symbology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Symbology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "qr" | "qr_code" => Ok(Symbology::Qr),
            "code39" | "code_39" => Ok(Symbology::Code39),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

/// Set of symbologies
pub type FormatSet = BTreeSet<Symbology>;

/// Requested formats for a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FormatSelection {
    /// Native detector first, every software decoder as fallback
    #[default]
    Auto,
    /// Only the listed symbologies
    Only(FormatSet),
}

impl FormatSelection {
    /// Build a selection from a list, e.g. parsed from the command line
    pub fn only(formats: impl IntoIterator<Item = Symbology>) -> Self {
        FormatSelection::Only(formats.into_iter().collect())
    }

    /// Concrete set of symbologies to enable
    ///
    /// An explicit empty list falls back to QR only.
    pub fn resolve(&self) -> FormatSet {
        match self {
            FormatSelection::Auto => Symbology::ALL.into_iter().collect(),
            FormatSelection::Only(set) if set.is_empty() => FormatSet::from([Symbology::Qr]),
            FormatSelection::Only(set) => set.clone(),
        }
    }
}

/// Identity of the backend that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendId {
    /// Host-provided detector
    NativeDetector,
    /// Software QR decoder
    SoftQr,
    /// Software Code 39 decoder
    SoftCode39,
}

impl BackendId {
    /// Rank within a chain; higher runs first
    pub fn priority(&self) -> u8 {
        match self {
            BackendId::NativeDetector => 3,
            BackendId::SoftQr => 2,
            BackendId::SoftCode39 => 1,
        }
    }

    /// Software backend for a symbology
    pub fn soft(symbology: Symbology) -> Self {
        match symbology {
            Symbology::Qr => BackendId::SoftQr,
            Symbology::Code39 => BackendId::SoftCode39,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::NativeDetector => "native-detector",
            BackendId::SoftQr => "soft-qr",
            BackendId::SoftCode39 => "soft-code39",
        }
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preparation state of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Readiness {
    /// `prepare()` has not settled yet
    #[default]
    Uninitialized,
    /// Attempts may run
    Ready,
    /// Setup failed; terminal for this backend
    Unavailable,
}

/// A decoding strategy
///
/// `prepare` may be called any number of times and from several tasks; the
/// underlying setup runs once. `attempt` never fails: errors inside a
/// backend come back as `None`.
pub trait DecoderBackend: Send + Sync {
    /// Which backend this is
    fn id(&self) -> BackendId;

    /// Symbologies this backend can recognise
    ///
    /// For the native detector this narrows to the negotiated set once
    /// preparation has settled.
    fn capabilities(&self) -> FormatSet;

    /// Current readiness, without triggering setup
    fn readiness(&self) -> Readiness;

    /// Run one-time setup (if not already done) and report the outcome
    fn prepare(&self) -> BoxFuture<'_, Readiness>;

    /// Try to read a payload from `frame`
    fn attempt<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Option<String>>;

    /// True for expensive backends the scheduler should only run on
    /// throttled ticks
    fn is_throttled(&self) -> bool {
        false
    }
}

/// Opaque single-frame reader used by software backends
pub trait SymbolReader: Send + Sync {
    /// Read at most one payload from `frame`
    ///
    /// `Ok(None)` means nothing was found; `Err` is an internal failure the
    /// caller absorbs.
    fn read(&self, frame: &Frame) -> Result<Option<String>, DecodeError>;
}

/// Source of the "decoder ready" signal for software backends
pub trait DependencyLoader: Send + Sync {
    /// Make the decoder for `symbology` usable, reporting the outcome
    fn ensure_available(&self, symbology: Symbology) -> BoxFuture<'_, Readiness>;
}

/// Loader for decoders compiled into this crate; always ready
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledDecoders;

impl DependencyLoader for BundledDecoders {
    fn ensure_available(&self, _symbology: Symbology) -> BoxFuture<'_, Readiness> {
        futures::future::ready(Readiness::Ready).boxed()
    }
}

/// Trim a raw payload; empty payloads are not hits
pub fn normalize_payload(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// One-shot readiness latch shared by all backend variants
#[derive(Debug, Default)]
pub(crate) struct ReadinessCell {
    cell: OnceCell<Readiness>,
}

impl ReadinessCell {
    pub(crate) fn get(&self) -> Readiness {
        self.cell.get().copied().unwrap_or_default()
    }

    /// Settle the latch with `setup` unless it already settled
    ///
    /// Concurrent callers wait for the first setup instead of starting
    /// their own. A setup reporting `Uninitialized` counts as unavailable.
    pub(crate) async fn settle<F, Fut>(&self, setup: F) -> Readiness
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Readiness>,
    {
        *self
            .cell
            .get_or_init(|| async move {
                match setup().await {
                    Readiness::Ready => Readiness::Ready,
                    _ => Readiness::Unavailable,
                }
            })
            .await
    }
}
