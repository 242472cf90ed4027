// SPDX-License-Identifier: GPL-3.0-only
//! Thread lifecycle management for capture streams
//!
//! Capture streams publish frames from a dedicated thread so that a blocking
//! dequeue never stalls the engine's sampling loop. This module owns that
//! thread: start it, signal it, join it on stop or drop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the capture loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// ```ignore
/// let controller = CaptureLoopController::start("v4l2-capture", move || {
///     match stream.next() {
///         Ok((buf, _meta)) => {
///             sink.publish(frame_from(buf));
///             LoopAction::Continue
///         }
///         Err(_) => LoopAction::Continue,
///     }
/// });
///
/// // Stops the thread and waits for it to exit
/// controller.stop();
/// ```
pub struct CaptureLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureLoopController {
    /// Run `loop_fn` repeatedly on a new thread until it returns
    /// [`LoopAction::Stop`] or the controller is stopped
    pub fn start<F>(name: &str, loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn(name, None, loop_fn)
    }

    /// Like [`start`](Self::start), but iterations begin at most once per
    /// `period`
    ///
    /// Used by sources that have no hardware clock of their own.
    pub fn start_paced<F>(name: &str, period: Duration, loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        Self::spawn(name, Some(period), loop_fn)
    }

    fn spawn<F>(name: &str, period: Option<Duration>, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, ?period, "Starting capture loop");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture loop thread started");

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                let started = Instant::now();
                if loop_fn() == LoopAction::Stop {
                    debug!(name = %name_clone, "Loop requested stop");
                    break;
                }

                if let Some(period) = period {
                    // Sleep in short slices so a stop request is honoured promptly
                    while started.elapsed() < period && !stop_signal_clone.load(Ordering::SeqCst) {
                        let remaining = period.saturating_sub(started.elapsed());
                        thread::sleep(remaining.min(Duration::from_millis(5)));
                    }
                }
            }

            info!(name = %name_clone, "Capture loop thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the loop is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Signal the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Signal the loop and wait at most `limit` for the thread to finish
    ///
    /// A thread still blocked after `limit` is detached and exits on its own
    /// once its current iteration returns. Returns true if it was joined.
    pub fn stop_within(&mut self, limit: Duration) -> bool {
        self.request_stop();
        let deadline = Instant::now() + limit;
        while self.thread_handle.as_ref().is_some_and(|h| !h.is_finished()) {
            if Instant::now() >= deadline {
                warn!(name = %self.name, ?limit, "Capture loop did not exit in time, detaching");
                self.thread_handle.take();
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
        self.join();
        true
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture loop thread finished");
            }
        }
    }
}

impl Drop for CaptureLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureLoopController dropped, stopping loop");
            self.stop();
        }
    }
}
