// SPDX-License-Identifier: GPL-3.0-only

//! Result policy
//!
//! Decides what a decoder hit means for the scan: emit and stop, emit and
//! keep going, or drop the payload and keep going.

use super::types::{ResultMode, Validator};
use tracing::debug;

/// Outcome for one hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    EmitAndStop,
    EmitAndContinue,
    /// Nothing is emitted; sampling continues
    RejectAndContinue,
}

impl Verdict {
    pub fn emits(&self) -> bool {
        !matches!(self, Verdict::RejectAndContinue)
    }

    pub fn stops(&self) -> bool {
        matches!(self, Verdict::EmitAndStop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyState {
    /// Waiting for hits
    Awaiting,
    /// A stopping verdict was given; later hits are rejected
    Settled,
}

/// Per-`start()` result policy
pub struct ResultPolicy {
    mode: ResultMode,
    validator: Option<Validator>,
    state: PolicyState,
}

impl ResultPolicy {
    /// `validator` only matters in [`ResultMode::StopOnValid`]; without one
    /// every payload is valid
    pub fn new(mode: ResultMode, validator: Option<Validator>) -> Self {
        Self {
            mode,
            validator,
            state: PolicyState::Awaiting,
        }
    }

    pub fn decide(&mut self, payload: &str) -> Verdict {
        if self.state == PolicyState::Settled {
            return Verdict::RejectAndContinue;
        }

        let verdict = match self.mode {
            ResultMode::StopOnce => Verdict::EmitAndStop,
            ResultMode::Continuous => Verdict::EmitAndContinue,
            ResultMode::StopOnValid => {
                let valid = self.validator.as_ref().is_none_or(|v| v(payload));
                if valid {
                    Verdict::EmitAndStop
                } else {
                    debug!(payload, "Payload rejected by validator");
                    Verdict::RejectAndContinue
                }
            }
        };

        if verdict.stops() {
            self.state = PolicyState::Settled;
        }
        verdict
    }

    pub fn state(&self) -> PolicyState {
        self.state
    }

    pub fn mode(&self) -> ResultMode {
        self.mode
    }
}
