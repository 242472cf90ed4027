// SPDX-License-Identifier: GPL-3.0-only

//! Decoder chain
//!
//! Orders the enabled backends by priority and runs them against one frame,
//! stopping at the first payload.

use super::types::DecodeResult;
use crate::backends::camera::Frame;
use crate::backends::decoders::{
    BackendId, DecoderBackend, DependencyLoader, FormatSelection, FormatSet, NativeBarcodePlatform,
    NativeDetector, Readiness, SoftDecoder, SymbolReader, Symbology,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, trace};

/// Collaborators a chain is built from
#[derive(Clone)]
pub struct ChainParts {
    /// Host detector, if the platform has one
    pub native: Option<Arc<dyn NativeBarcodePlatform>>,
    pub qr_reader: Arc<dyn SymbolReader>,
    pub code39_reader: Arc<dyn SymbolReader>,
    pub loader: Arc<dyn DependencyLoader>,
}

impl ChainParts {
    fn reader_for(&self, symbology: Symbology) -> Arc<dyn SymbolReader> {
        match symbology {
            Symbology::Qr => Arc::clone(&self.qr_reader),
            Symbology::Code39 => Arc::clone(&self.code39_reader),
        }
    }
}

/// Priority-ordered backends for one `start()`
pub struct DecoderChain {
    requested: FormatSet,
    backends: Vec<Arc<dyn DecoderBackend>>,
}

impl DecoderChain {
    /// Enable the backends for `selection`
    ///
    /// The native detector (when present) is negotiated against the whole
    /// requested set; one software decoder is added per requested format.
    pub fn build(selection: &FormatSelection, parts: &ChainParts) -> Self {
        let requested = selection.resolve();
        let mut backends: Vec<Arc<dyn DecoderBackend>> = Vec::new();

        if let Some(platform) = &parts.native {
            backends.push(Arc::new(NativeDetector::new(
                Arc::clone(platform),
                requested.clone(),
            )));
        }
        for &symbology in &requested {
            backends.push(Arc::new(SoftDecoder::new(
                symbology,
                parts.reader_for(symbology),
                Arc::clone(&parts.loader),
            )));
        }

        Self::from_backends(requested, backends)
    }

    /// Chain over arbitrary backends, sorted by priority
    pub fn from_backends(requested: FormatSet, mut backends: Vec<Arc<dyn DecoderBackend>>) -> Self {
        backends.sort_by_key(|b| std::cmp::Reverse(b.id().priority()));
        debug!(
            requested = ?requested,
            backends = ?backends.iter().map(|b| b.id()).collect::<Vec<_>>(),
            "Decoder chain built"
        );
        Self {
            requested,
            backends,
        }
    }

    pub fn requested(&self) -> &FormatSet {
        &self.requested
    }

    pub fn backend_ids(&self) -> Vec<BackendId> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Prepare every backend concurrently and report each outcome
    pub async fn prepare_all(&self) -> Vec<(BackendId, Readiness)> {
        let outcomes = join_all(self.backends.iter().map(|b| b.prepare())).await;
        self.backends
            .iter()
            .map(|b| b.id())
            .zip(outcomes)
            .collect()
    }

    /// Requested formats with at least one ready backend
    pub fn coverage(&self) -> FormatSet {
        self.backends
            .iter()
            .filter(|b| b.readiness() == Readiness::Ready)
            .flat_map(|b| b.capabilities())
            .filter(|f| self.requested.contains(f))
            .collect()
    }

    /// Requested formats with no ready backend
    pub fn uncovered(&self) -> FormatSet {
        self.requested.difference(&self.coverage()).copied().collect()
    }

    pub fn has_native_ready(&self) -> bool {
        self.backends
            .iter()
            .any(|b| b.id() == BackendId::NativeDetector && b.readiness() == Readiness::Ready)
    }

    /// Try ready backends in priority order; first payload wins
    ///
    /// Throttled backends only run when `allow_throttled` is set.
    pub async fn run(&self, frame: &Frame, allow_throttled: bool) -> Option<DecodeResult> {
        self.run_until(frame, allow_throttled, || false).await
    }

    /// Like [`run`](Self::run), but gives up between backends once
    /// `cancelled` reports true
    pub async fn run_until(
        &self,
        frame: &Frame,
        allow_throttled: bool,
        cancelled: impl Fn() -> bool,
    ) -> Option<DecodeResult> {
        for backend in &self.backends {
            if cancelled() {
                return None;
            }
            if backend.readiness() != Readiness::Ready {
                continue;
            }
            if backend.capabilities().is_disjoint(&self.requested) {
                continue;
            }
            if backend.is_throttled() && !allow_throttled {
                continue;
            }

            if let Some(payload) = backend.attempt(frame).await {
                trace!(backend = %backend.id(), "Backend produced a payload");
                return Some(DecodeResult {
                    payload,
                    backend: backend.id(),
                    captured_at: frame.captured_at(),
                });
            }
        }
        None
    }
}
