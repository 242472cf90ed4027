// SPDX-License-Identifier: GPL-3.0-only

//! Native (host-provided) barcode detection
//!
//! Some hosts ship a hardware or OS detector. The engine only sees it through
//! [`NativeBarcodePlatform`]. Before use the detector negotiates: it asks the
//! platform which symbologies it supports and keeps only those the caller
//! asked for. No overlap means the backend is unavailable.

use super::{
    BackendId, DecoderBackend, FormatSet, Readiness, ReadinessCell, Symbology, normalize_payload,
};
use crate::backends::camera::Frame;
use crate::errors::DecodeError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, trace};

/// One code reported by the platform detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBarcode {
    /// Decoded content, as reported
    pub raw_value: String,
    /// Symbology of the code
    pub format: Symbology,
}

/// Host barcode detection capability
pub trait NativeBarcodePlatform: Send + Sync {
    /// Symbologies the host can detect
    fn supported_formats(&self) -> BoxFuture<'_, Result<FormatSet, DecodeError>>;

    /// Detect codes of the given formats in `frame`
    fn detect<'a>(
        &'a self,
        frame: &'a Frame,
        formats: &'a FormatSet,
    ) -> BoxFuture<'a, Result<Vec<DetectedBarcode>, DecodeError>>;
}

/// Backend wrapping a host detector
pub struct NativeDetector {
    platform: Arc<dyn NativeBarcodePlatform>,
    requested: FormatSet,
    negotiated: OnceLock<FormatSet>,
    readiness: ReadinessCell,
}

impl NativeDetector {
    pub fn new(platform: Arc<dyn NativeBarcodePlatform>, requested: FormatSet) -> Self {
        Self {
            platform,
            requested,
            negotiated: OnceLock::new(),
            readiness: ReadinessCell::default(),
        }
    }

    async fn negotiate(&self) -> Readiness {
        let supported = match self.platform.supported_formats().await {
            Ok(formats) => formats,
            Err(e) => {
                info!(error = %e, "Native detector could not list formats");
                return Readiness::Unavailable;
            }
        };

        let usable: FormatSet = supported.intersection(&self.requested).copied().collect();
        debug!(?supported, requested = ?self.requested, ?usable, "Native format negotiation");

        let ready = !usable.is_empty();
        let _ = self.negotiated.set(usable);
        if ready {
            Readiness::Ready
        } else {
            Readiness::Unavailable
        }
    }
}

impl DecoderBackend for NativeDetector {
    fn id(&self) -> BackendId {
        BackendId::NativeDetector
    }

    fn capabilities(&self) -> FormatSet {
        self.negotiated
            .get()
            .unwrap_or(&self.requested)
            .clone()
    }

    fn readiness(&self) -> Readiness {
        self.readiness.get()
    }

    fn prepare(&self) -> BoxFuture<'_, Readiness> {
        self.readiness.settle(|| self.negotiate()).boxed()
    }

    fn attempt<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Option<String>> {
        async move {
            let formats = self.negotiated.get()?;
            match self.platform.detect(frame, formats).await {
                Ok(codes) => codes
                    .iter()
                    .filter(|code| formats.contains(&code.format))
                    .find_map(|code| normalize_payload(&code.raw_value)),
                Err(e) => {
                    trace!(error = %e, "Native detect failed");
                    None
                }
            }
        }
        .boxed()
    }
}
