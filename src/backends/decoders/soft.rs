// SPDX-License-Identifier: GPL-3.0-only

//! Software decoder backends
//!
//! A software backend pairs a [`SymbolReader`] with the loader that reports
//! whether that reader is usable. QR reads run inline on the sampling task.
//! Code 39 reads are costly, so they move to the blocking pool and the
//! backend reports itself as throttled.

use super::{
    BackendId, DecoderBackend, DependencyLoader, FormatSet, Readiness, ReadinessCell,
    SymbolReader, Symbology, normalize_payload,
};
use crate::backends::camera::Frame;
use crate::errors::DecodeError;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Software decoder for one symbology
pub struct SoftDecoder {
    symbology: Symbology,
    reader: Arc<dyn SymbolReader>,
    loader: Arc<dyn DependencyLoader>,
    readiness: ReadinessCell,
    offload: bool,
}

impl SoftDecoder {
    /// Build the decoder for `symbology`
    ///
    /// Code 39 reads are offloaded to the blocking pool and throttled.
    pub fn new(
        symbology: Symbology,
        reader: Arc<dyn SymbolReader>,
        loader: Arc<dyn DependencyLoader>,
    ) -> Self {
        Self {
            symbology,
            reader,
            loader,
            readiness: ReadinessCell::default(),
            offload: symbology == Symbology::Code39,
        }
    }

    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    async fn read_offloaded(&self, frame: &Frame) -> Result<Option<String>, DecodeError> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return read_guarded(self.reader.as_ref(), frame);
        };

        let reader = Arc::clone(&self.reader);
        let frame = frame.clone();
        handle
            .spawn_blocking(move || read_guarded(reader.as_ref(), &frame))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Offloaded decode task failed");
                Err(DecodeError::Failed(e.to_string()))
            })
    }
}

/// Run the reader, converting a panic into a decode error
fn read_guarded(reader: &dyn SymbolReader, frame: &Frame) -> Result<Option<String>, DecodeError> {
    catch_unwind(AssertUnwindSafe(|| reader.read(frame)))
        .unwrap_or_else(|_| Err(DecodeError::Failed("reader panicked".into())))
}

impl DecoderBackend for SoftDecoder {
    fn id(&self) -> BackendId {
        BackendId::soft(self.symbology)
    }

    fn capabilities(&self) -> FormatSet {
        FormatSet::from([self.symbology])
    }

    fn readiness(&self) -> Readiness {
        self.readiness.get()
    }

    fn prepare(&self) -> BoxFuture<'_, Readiness> {
        async move {
            let state = self
                .readiness
                .settle(|| self.loader.ensure_available(self.symbology))
                .await;
            debug!(backend = %self.id(), ?state, "Software decoder prepared");
            state
        }
        .boxed()
    }

    fn attempt<'a>(&'a self, frame: &'a Frame) -> BoxFuture<'a, Option<String>> {
        async move {
            let outcome = if self.offload {
                self.read_offloaded(frame).await
            } else {
                read_guarded(self.reader.as_ref(), frame)
            };

            match outcome {
                Ok(Some(payload)) => normalize_payload(&payload),
                Ok(None) => None,
                Err(e) => {
                    trace!(backend = %self.id(), error = %e, "Decode attempt failed");
                    None
                }
            }
        }
        .boxed()
    }

    fn is_throttled(&self) -> bool {
        self.offload
    }
}
