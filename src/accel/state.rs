//! Host-side mirror of a PE's phase state machine
//!
//! ```text
//!          ┌──────── CONFIG ◄──┐
//!          ▼                   │
//! IDLE ─► INIT ─► REGULAR ─► FLUSH ─► IDLE
//! ```
//!
//! A phase is entered when start is asserted in its mode and left when start
//! is cleared after the finished register was observed. INIT, REGULAR and
//! FLUSH must run in that order; CONFIG may only run between executions.
//! A forced exit parks the tracker in `Aborted` until [`PhaseTracker::reset`].

use crate::error::{Error, Result};
use crate::runtime::Phase;

/// Current state of one PE as seen by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    /// No phase running; `last` is the most recently completed phase
    Idle {
        /// Last completed phase, `None` after construction or reset
        last: Option<Phase>,
    },
    /// Start asserted in this phase
    Running(Phase),
    /// Forced exit; the device state is undefined
    Aborted,
}

/// Enforces legal phase transitions
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    state: PhaseState,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    /// A tracker in `Idle` with no history
    pub fn new() -> Self {
        Self {
            state: PhaseState::Idle { last: None },
        }
    }

    /// Current state
    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Is a phase currently running?
    pub fn is_running(&self) -> bool {
        matches!(self.state, PhaseState::Running(_))
    }

    /// Has the unit been force-exited since the last reset?
    pub fn is_aborted(&self) -> bool {
        self.state == PhaseState::Aborted
    }

    /// Record that start is about to be asserted in `phase`
    pub fn begin(&mut self, phase: Phase) -> Result<()> {
        let PhaseState::Idle { last } = self.state else {
            return Err(self.illegal(phase));
        };
        let allowed = match phase {
            Phase::Init => true,
            Phase::Regular => last == Some(Phase::Init),
            Phase::Flush => last == Some(Phase::Regular),
            Phase::Config => matches!(last, None | Some(Phase::Flush) | Some(Phase::Config)),
        };
        if !allowed {
            return Err(self.illegal(phase));
        }
        self.state = PhaseState::Running(phase);
        Ok(())
    }

    /// Record that start was cleared after `phase` finished
    pub fn complete(&mut self, phase: Phase) -> Result<()> {
        if self.state != PhaseState::Running(phase) {
            return Err(Error::precondition(
                "set_phase",
                format!("cannot complete {} while {:?}", phase, self.state),
            ));
        }
        self.state = PhaseState::Idle { last: Some(phase) };
        Ok(())
    }

    /// Enter `Aborted`
    pub fn abort(&mut self) {
        self.state = PhaseState::Aborted;
    }

    /// Return to `Idle` with no history
    pub fn reset(&mut self) {
        self.state = PhaseState::Idle { last: None };
    }

    fn illegal(&self, phase: Phase) -> Error {
        match self.state {
            PhaseState::Aborted => {
                Error::precondition("set_phase", "unit was force-exited; reset it first")
            }
            state => Error::precondition(
                "set_phase",
                format!("cannot start {} while {:?}", phase, state),
            ),
        }
    }
}
