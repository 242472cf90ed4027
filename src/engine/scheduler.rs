// SPDX-License-Identifier: GPL-3.0-only

//! Frame scheduler
//!
//! Drives the sampling loop. The scheduler only tracks state and timing;
//! the engine's loop task does the work of each tick:
//!
//! ```text
//!            begin_tick             end_tick
//!   Idle ───────────────► Ticking ───────────► Scheduled
//!                            ▲                     │
//!                            └──── begin_tick ─────┘
//!
//!   any state ── cancel ──► Cancelled (terminal)
//! ```

use crate::constants::sampling;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Ticking,
    Cancelled,
}

/// Pacing between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Once per rendered frame; used while a native detector is ready
    FrameSynced,
    /// Fixed period for software-only decoding
    Fixed(Duration),
}

impl Cadence {
    pub fn interval(&self) -> Duration {
        match self {
            Cadence::FrameSynced => sampling::FRAME_SYNC_INTERVAL,
            Cadence::Fixed(period) => *period,
        }
    }
}

/// A tick in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Zero-based tick number within this `start()`
    pub index: u64,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<SchedulerState>,
    cancelled: AtomicBool,
    wake: Notify,
}

/// Cloneable handle that can cancel a scheduler from any thread
#[derive(Debug, Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Cancel the scheduler; idempotent and never blocks on a tick
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = SchedulerState::Cancelled;
        self.shared.wake.notify_waiters();
        debug!("Frame scheduler cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }
}

/// Sampling loop pacing and throttling
#[derive(Debug)]
pub struct FrameScheduler {
    shared: Arc<Shared>,
    soft_interval: Duration,
    throttle_divisor: u64,
    next_index: u64,
    current: Option<Tick>,
}

impl FrameScheduler {
    /// Scheduler for a software sampling rate of `target_fps`
    pub fn new(target_fps: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SchedulerState::Idle),
                cancelled: AtomicBool::new(false),
                wake: Notify::new(),
            }),
            soft_interval: sampling::soft_interval(target_fps),
            throttle_divisor: sampling::CODE39_TICK_DIVISOR,
            next_index: 0,
            current: None,
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Pacing for the next wait
    pub fn cadence(&self, native_ready: bool) -> Cadence {
        if native_ready {
            Cadence::FrameSynced
        } else {
            Cadence::Fixed(self.soft_interval)
        }
    }

    /// Enter a tick; `None` once cancelled
    pub fn begin_tick(&mut self) -> Option<Tick> {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *state == SchedulerState::Cancelled {
            return None;
        }
        *state = SchedulerState::Ticking;

        let tick = Tick {
            index: self.next_index,
        };
        self.next_index += 1;
        self.current = Some(tick);
        trace!(tick = tick.index, "Tick started");
        Some(tick)
    }

    /// Leave the current tick
    pub fn end_tick(&mut self) {
        self.current = None;
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *state == SchedulerState::Ticking {
            *state = SchedulerState::Scheduled;
        }
    }

    /// Whether a backend may run on the current tick
    ///
    /// Throttled backends run on one tick out of every
    /// [`sampling::CODE39_TICK_DIVISOR`], starting with the first.
    pub fn allows(&self, throttled: bool) -> bool {
        match self.current {
            Some(tick) => !throttled || tick.index % self.throttle_divisor == 0,
            None => false,
        }
    }

    /// Sleep until the next tick is due
    ///
    /// Returns `false` without waiting the full period if cancelled.
    pub async fn wait_next(&self, cadence: Cadence) -> bool {
        let notified = self.shared.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_cancelled() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(cadence.interval()) => !self.is_cancelled(),
            _ = notified => false,
        }
    }

    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> SchedulerState {
        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Ticks begun so far
    pub fn ticks(&self) -> u64 {
        self.next_index
    }
}
