// SPDX-License-Identifier: GPL-3.0-only

//! Scan engine
//!
//! Composes the camera session, decoder chain, frame scheduler and result
//! policy behind `start()` / `stop()`.
//!
//! ```text
//!   start() ──► acquire camera ─────────────┐
//!          └──► prepare backends (spawned)  │
//!                                           ▼
//!               ┌──────────── sampling loop (one tokio task) ───────────┐
//!               │ begin_tick → current_frame → chain.run → policy.decide │
//!               │      ▲                                        │       │
//!               │      └──────── wait_next(cadence) ◄───────────┘       │
//!               └────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `start()` gets a generation number. `stop()` bumps it, so work
//! that finishes after a stop (an acquisition, a preparation, a decode)
//! sees a stale generation and is dropped.

pub mod chain;
pub mod policy;
pub mod scheduler;
pub mod types;

pub use chain::{ChainParts, DecoderChain};
pub use policy::{PolicyState, ResultPolicy, Verdict};
pub use scheduler::{Cadence, CancelHandle, FrameScheduler, SchedulerState, Tick};
pub use types::*;

use crate::backends::camera::{CameraSession, FrameSample, MediaDevices};
use crate::backends::decoders::{
    BundledDecoders, Code39Reader, DependencyLoader, FormatSelection, NativeBarcodePlatform,
    RqrrReader, SymbolReader,
};
use crate::errors::{ErrorKind, ScanError, ScanResult};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type SharedSession = Arc<Mutex<CameraSession>>;

/// Bookkeeping for the current `start()`
#[derive(Default)]
struct RunSlot {
    state: EngineState,
    generation: u64,
    cancel: Option<CancelHandle>,
    session: Option<SharedSession>,
    callbacks: Callbacks,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    devices: Arc<dyn MediaDevices>,
    parts: ChainParts,
    formats: Mutex<FormatSelection>,
    run: Mutex<RunSlot>,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, RunSlot> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self.run.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        if let Some(session) = slot.session.take() {
            session.lock().unwrap_or_else(PoisonError::into_inner).release();
        }
    }
}

/// Builder for [`ScanEngine`]
pub struct ScanEngineBuilder {
    devices: Arc<dyn MediaDevices>,
    native: Option<Arc<dyn NativeBarcodePlatform>>,
    loader: Arc<dyn DependencyLoader>,
    qr_reader: Arc<dyn SymbolReader>,
    code39_reader: Arc<dyn SymbolReader>,
    formats: FormatSelection,
}

impl ScanEngineBuilder {
    /// Use a host barcode detector ahead of the software decoders
    pub fn native(mut self, platform: Arc<dyn NativeBarcodePlatform>) -> Self {
        self.native = Some(platform);
        self
    }

    pub fn loader(mut self, loader: Arc<dyn DependencyLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn qr_reader(mut self, reader: Arc<dyn SymbolReader>) -> Self {
        self.qr_reader = reader;
        self
    }

    pub fn code39_reader(mut self, reader: Arc<dyn SymbolReader>) -> Self {
        self.code39_reader = reader;
        self
    }

    /// Initial format selection
    pub fn formats(mut self, formats: FormatSelection) -> Self {
        self.formats = formats;
        self
    }

    pub fn build(self) -> ScanEngine {
        ScanEngine {
            inner: Arc::new(Inner {
                devices: self.devices,
                parts: ChainParts {
                    native: self.native,
                    qr_reader: self.qr_reader,
                    code39_reader: self.code39_reader,
                    loader: self.loader,
                },
                formats: Mutex::new(self.formats),
                run: Mutex::new(RunSlot::default()),
            }),
        }
    }
}

/// Barcode scanning engine
///
/// Cloning yields another handle to the same engine. `stop()` may be called
/// from any thread, including from inside a result callback.
#[derive(Clone)]
pub struct ScanEngine {
    inner: Arc<Inner>,
}

impl ScanEngine {
    /// Engine with the bundled software decoders and no native detector
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self::builder(devices).build()
    }

    pub fn builder(devices: Arc<dyn MediaDevices>) -> ScanEngineBuilder {
        ScanEngineBuilder {
            devices,
            native: None,
            loader: Arc::new(BundledDecoders),
            qr_reader: Arc::new(RqrrReader::new()),
            code39_reader: Arc::new(Code39Reader::new()),
            formats: FormatSelection::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.inner.slot().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// Change the requested formats; takes effect at the next `start()`
    pub fn set_formats(&self, formats: FormatSelection) {
        debug!(?formats, "Format selection updated");
        *self
            .inner
            .formats
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = formats;
    }

    pub fn formats(&self) -> FormatSelection {
        self.inner
            .formats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Begin scanning
    ///
    /// Returns once the camera is attached and the sampling loop runs, or
    /// after acquisition failed. Calling `start()` while a scan is active
    /// does nothing. If `stop()` wins the race against acquisition the
    /// stream is released and `Ok(())` is returned.
    ///
    /// Fatal errors are also reported once through the error callback.
    pub async fn start(&self, config: ScanConfig) -> ScanResult<()> {
        let callbacks = config.callbacks.clone();

        let state = self.state();
        if state != EngineState::Idle {
            debug!(%state, "Scan already active, ignoring start()");
            return Ok(());
        }

        let Some(sink) = config.sink.clone() else {
            let err = ScanError::NotMounted;
            warn!("start() called without a video sink");
            callbacks.error(err.kind(), &err.to_string());
            return Err(err);
        };

        let selection = config.formats.clone().unwrap_or_else(|| self.formats());
        let chain = Arc::new(DecoderChain::build(&selection, &self.inner.parts));
        let scheduler = FrameScheduler::new(config.target_fps);

        let generation = {
            let mut slot = self.inner.slot();
            if slot.state != EngineState::Idle {
                debug!(state = %slot.state, "Scan already active, ignoring start()");
                return Ok(());
            }
            slot.state = EngineState::Starting;
            slot.generation += 1;
            slot.cancel = Some(scheduler.cancel_handle());
            slot.callbacks = callbacks.clone();
            slot.generation
        };
        info!(generation, formats = ?chain.requested(), mode = ?config.mode, "Starting scan");

        // Backend preparation runs alongside camera acquisition
        tokio::spawn(prepare_backends(
            Arc::downgrade(&self.inner),
            generation,
            Arc::clone(&chain),
        ));

        let mut session = CameraSession::new(Arc::clone(&self.inner.devices), &sink, config.facing);
        if let Err(e) = session.acquire().await {
            let err = ScanError::from(e);
            if self.abandon_start(generation) {
                warn!(error = %err, "Camera acquisition failed");
                callbacks.error(err.kind(), &err.to_string());
            }
            return Err(err);
        }

        let session = Arc::new(Mutex::new(session));
        {
            let mut slot = self.inner.slot();
            if slot.generation != generation || slot.state != EngineState::Starting {
                drop(slot);
                debug!(generation, "Scan stopped during acquisition");
                session
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .release();
                return Ok(());
            }
            slot.state = EngineState::Running;
            slot.session = Some(Arc::clone(&session));
        }

        callbacks.activity(true);

        let policy = ResultPolicy::new(config.mode, config.effective_validator());
        let task = tokio::spawn(sampling_loop(
            Arc::downgrade(&self.inner),
            generation,
            scheduler,
            chain,
            session,
            policy,
            callbacks,
        ));

        let mut slot = self.inner.slot();
        if slot.generation == generation {
            slot.task = Some(task);
        }
        Ok(())
    }

    /// Stop scanning and release the camera
    ///
    /// Synchronous and idempotent. In-flight decode results are discarded.
    pub fn stop(&self) {
        stop_generation(&self.inner, None);
    }

    /// Reset a `start()` whose acquisition failed; false if a stop already
    /// took over
    fn abandon_start(&self, generation: u64) -> bool {
        let mut slot = self.inner.slot();
        if slot.generation != generation || slot.state != EngineState::Starting {
            return false;
        }
        slot.generation += 1;
        slot.state = EngineState::Idle;
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        true
    }
}

impl std::fmt::Debug for ScanEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanEngine")
            .field("devices", &self.inner.devices.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Stop the scan, or only the given generation of it
///
/// Returns true if this call performed the stop.
fn stop_generation(inner: &Inner, only: Option<u64>) -> bool {
    let (session, cancel, callbacks, generation, was_running) = {
        let mut slot = inner.slot();
        if matches!(slot.state, EngineState::Idle | EngineState::Stopping) {
            return false;
        }
        if only.is_some_and(|g| g != slot.generation) {
            return false;
        }
        let was_running = slot.state == EngineState::Running;
        slot.state = EngineState::Stopping;
        slot.generation += 1;
        // The loop notices cancellation on its own; the handle is detached
        slot.task.take();
        (
            slot.session.take(),
            slot.cancel.take(),
            slot.callbacks.clone(),
            slot.generation,
            was_running,
        )
    };
    debug!(generation, "Stopping scan");

    if let Some(cancel) = cancel {
        cancel.cancel();
    }
    if let Some(session) = session {
        session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release();
    }
    // The indicator is only raised once the loop runs
    if was_running {
        callbacks.activity(false);
    }

    let mut slot = inner.slot();
    if slot.state == EngineState::Stopping && slot.generation == generation {
        slot.state = EngineState::Idle;
    }
    drop(slot);
    info!("Scan stopped");
    true
}

fn is_current(inner: &Inner, generation: u64) -> bool {
    let slot = inner.slot();
    slot.generation == generation
        && matches!(slot.state, EngineState::Starting | EngineState::Running)
}

/// Prepare every backend and judge coverage of the requested formats
async fn prepare_backends(engine: Weak<Inner>, generation: u64, chain: Arc<DecoderChain>) {
    let outcomes = chain.prepare_all().await;
    debug!(?outcomes, "Backend preparation settled");

    let Some(inner) = engine.upgrade() else {
        return;
    };
    if !is_current(&inner, generation) {
        return;
    }

    let coverage = chain.coverage();
    let uncovered = chain.uncovered();
    if coverage.is_empty() {
        let requested: Vec<&str> = chain.requested().iter().map(|f| f.as_str()).collect();
        let err = ScanError::NoDecoderAvailable(format!(
            "no usable backend for {}",
            requested.join(", ")
        ));
        let callbacks = inner.slot().callbacks.clone();
        if stop_generation(&inner, Some(generation)) {
            warn!(error = %err, "Every requested format is unavailable");
            callbacks.error(ErrorKind::NoDecoderAvailable, &err.to_string());
        }
    } else if !uncovered.is_empty() {
        warn!(
            kind = %ErrorKind::BackendUnavailable,
            unavailable = ?uncovered,
            available = ?coverage,
            "Continuing without some requested formats"
        );
    }
}

/// The sampling loop for one `start()`
async fn sampling_loop(
    engine: Weak<Inner>,
    generation: u64,
    mut scheduler: FrameScheduler,
    chain: Arc<DecoderChain>,
    session: SharedSession,
    mut policy: ResultPolicy,
    callbacks: Callbacks,
) {
    let cancel = scheduler.cancel_handle();
    let still_current = || {
        !cancel.is_cancelled() && engine.upgrade().is_some_and(|inner| is_current(&inner, generation))
    };

    while let Some(tick) = scheduler.begin_tick() {
        let sample = session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_frame();

        if let FrameSample::Ready(frame) = sample {
            callbacks.heartbeat(frame.width(), frame.height(), frame.captured_at());

            let allow_throttled = scheduler.allows(true);
            let result = chain
                .run_until(&frame, allow_throttled, || cancel.is_cancelled())
                .await;

            if !still_current() {
                debug!(tick = tick.index, "Discarding tick result after stop");
                break;
            }

            if let Some(result) = result {
                let verdict = policy.decide(&result.payload);
                debug!(
                    tick = tick.index,
                    backend = %result.backend,
                    ?verdict,
                    "Decoder hit"
                );
                if verdict.stops() {
                    if let Some(inner) = engine.upgrade() {
                        stop_generation(&inner, Some(generation));
                    }
                    callbacks.result(&result.payload, result.backend);
                    break;
                }
                if verdict.emits() {
                    callbacks.result(&result.payload, result.backend);
                }
            }
        } else if !still_current() {
            break;
        }

        scheduler.end_tick();
        let cadence = scheduler.cadence(chain.has_native_ready());
        if !scheduler.wait_next(cadence).await {
            break;
        }
    }

    debug!(generation, ticks = scheduler.ticks(), "Sampling loop finished");
}
