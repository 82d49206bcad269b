//! Lock-step SpMV across many PEs
//!
//! The matrix is cut into one row-contiguous partition per PE. Every unit
//! gets the full input vector and the exact slice of the output vector its
//! partition covers, so results land in place with no merge step.
//!
//! Each phase is a barrier: start is asserted on every unit, the orchestrator
//! waits until all of them report finished, then clears start everywhere
//! before the next phase begins.

use std::ops::Range;

use tracing::{debug, warn};

use super::unit::AcceleratorUnit;
use crate::config::SpmvConfig;
use crate::dtype::{Element, SparseIndex};
use crate::error::{Error, Result};
use crate::executor::{SpmvExecutor, HARDWARE_STAT_KEYS};
use crate::runtime::{poll_until, CancelToken, Phase, PollPolicy, RegisterBus};
use crate::sparse::SparseMatrix;

/// Most PEs one orchestrator can drive
pub const MAX_PES: u32 = 64;

/// Executor fanning one SpMV across `num_pes` [`AcceleratorUnit`]s
///
/// The bus is attached for the orchestrator's lifetime and detached on drop,
/// after every unit has released its device buffers.
pub struct ParallelOrchestrator<'a, B: RegisterBus, I: SparseIndex, V: Element> {
    bus: B,
    units: Vec<AcceleratorUnit<'a, B, I, V>>,
    partitions: Vec<Range<usize>>,
    poll: PollPolicy,
    cancel: CancelToken,
}

impl<'a, B: RegisterBus, I: SparseIndex, V: Element> ParallelOrchestrator<'a, B, I, V> {
    /// Attach `bus` under `attach_name` and create `num_pes` units (1..=64)
    pub fn new(bus: B, num_pes: u32, attach_name: &str) -> Result<Self> {
        if num_pes == 0 || num_pes > MAX_PES {
            return Err(Error::invalid_argument(
                "num_pes",
                format!("{} is outside 1..={}", num_pes, MAX_PES),
            ));
        }
        bus.attach(attach_name)?;

        let poll = PollPolicy::default();
        let cancel = CancelToken::new();
        let units = (0..num_pes)
            .map(|pe| {
                AcceleratorUnit::new(bus.clone(), pe)
                    .with_poll_policy(poll.clone())
                    .with_cancel_token(cancel.clone())
            })
            .collect();
        debug!(num_pes, attach_name, "orchestrator attached");

        Ok(Self {
            bus,
            units,
            partitions: Vec::new(),
            poll,
            cancel,
        })
    }

    /// Build from a validated [`SpmvConfig`]
    ///
    /// Applies the poll policy, pulses the global reset if requested and
    /// programs the outstanding transaction count if one is given.
    pub fn with_config(bus: B, config: &SpmvConfig) -> Result<Self> {
        config.validate()?;
        let mut orch = Self::new(bus, config.num_pes, &config.attach_name)?;
        orch.set_poll_policy(config.poll.clone());
        if config.reset_on_attach {
            orch.reset_device();
        }
        if let Some(n) = config.outstanding_transactions {
            orch.set_outstanding_transactions(n)?;
        }
        Ok(orch)
    }

    /// Number of PEs driven
    pub fn num_pes(&self) -> usize {
        self.units.len()
    }

    /// The shared bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Unit driving PE `pe`
    pub fn unit(&self, pe: usize) -> Option<&AcceleratorUnit<'a, B, I, V>> {
        self.units.get(pe)
    }

    /// Row range of the output each PE covers, empty before `set_matrix`
    pub fn partition_rows(&self) -> &[Range<usize>] {
        &self.partitions
    }

    /// Poll policy used for barriers
    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Replace the poll policy for the orchestrator and every unit
    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        for unit in &mut self.units {
            unit.set_poll_policy(poll.clone());
        }
        self.poll = poll;
    }

    /// Token that aborts a running `exec` at the next poll or phase boundary
    ///
    /// Clone it into whatever handles external interrupts.
    pub fn abort_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Global signature register
    pub fn signature(&self) -> u32 {
        self.units.first().map_or(0, |u| u.signature())
    }

    /// Pulse the global reset register
    pub fn reset_device(&self) {
        if let Some(unit) = self.units.first() {
            unit.reset_device();
        }
    }

    /// Clear the abort token and every unit's abort state
    pub fn reset(&mut self) {
        self.cancel.reset();
        for unit in &mut self.units {
            unit.reset();
        }
    }

    /// Stop every unit and trip the abort token
    ///
    /// Best effort: the device is not guaranteed to be resumable without
    /// [`reset_device`](Self::reset_device) and [`reset`](Self::reset).
    pub fn force_exit(&mut self) {
        warn!(num_pes = self.units.len(), "forced exit of all units");
        self.cancel.cancel();
        for unit in &mut self.units {
            unit.force_exit();
        }
    }

    /// Program the outstanding transaction count (1..=16) on every unit and
    /// apply it with one lock-step CONFIG phase
    pub fn set_outstanding_transactions(&mut self, n: u32) -> Result<()> {
        for unit in &self.units {
            unit.program_outstanding_transactions(n)?;
        }
        self.run_phase(Phase::Config)
    }

    /// Per-PE values of `key`, in PE order
    pub fn unit_stats(&self, key: &str) -> Vec<Option<u64>> {
        self.units.iter().map(|u| u.stat(key)).collect()
    }

    /// Start `phase` everywhere, wait for all units, then clear start everywhere
    fn run_phase(&mut self, phase: Phase) -> Result<()> {
        self.cancel.check(phase.name())?;
        debug!(%phase, num_pes = self.units.len(), "phase fan-out");

        for unit in &mut self.units {
            unit.set_phase(phase, true)?;
        }

        let units = &self.units;
        let mut done = vec![false; units.len()];
        let waited = poll_until(&self.poll, &self.cancel, phase.name(), || {
            for (finished, unit) in done.iter_mut().zip(units) {
                if !*finished {
                    *finished = unit.is_finished();
                }
            }
            done.iter().all(|&f| f)
        });
        if let Err(e) = waited {
            warn!(%phase, error = %e, "barrier abandoned");
            for unit in &mut self.units {
                unit.force_exit();
            }
            return Err(e);
        }

        for unit in &mut self.units {
            unit.set_phase(phase, false)?;
        }
        Ok(())
    }
}

impl<'a, B: RegisterBus, I: SparseIndex, V: Element> SpmvExecutor<'a, I, V>
    for ParallelOrchestrator<'a, B, I, V>
{
    fn set_matrix(&mut self, matrix: &'a SparseMatrix<I, V>) -> Result<()> {
        let boundaries = matrix.partition_boundaries(self.units.len())?;
        let parts = matrix.partition(&boundaries)?;

        self.partitions.clear();
        for (unit, part) in self.units.iter_mut().zip(&parts) {
            unit.upload_matrix(part)?;
        }
        self.partitions = boundaries.windows(2).map(|w| w[0]..w[1]).collect();
        debug!(
            matrix = matrix.name(),
            partitions = ?self.partitions,
            "matrix distributed"
        );
        Ok(())
    }

    fn set_input(&mut self, x: &'a [V]) -> Result<()> {
        for unit in &mut self.units {
            unit.set_input(x)?;
        }
        Ok(())
    }

    fn set_output(&mut self, y: &'a mut [V]) -> Result<()> {
        let Some(rows) = self.partitions.last().map(|r| r.end) else {
            return Err(Error::precondition("set_output", "no matrix assigned"));
        };
        if y.len() < rows {
            return Err(Error::ShapeMismatch {
                what: "output vector",
                expected: rows,
                got: y.len(),
            });
        }

        let mut rest = y;
        for (unit, range) in self.units.iter_mut().zip(&self.partitions) {
            let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            unit.set_output(chunk)?;
            rest = tail;
        }
        Ok(())
    }

    fn exec(&mut self) -> Result<()> {
        self.cancel.check("exec")?;
        for unit in &self.units {
            unit.push_vectors()?;
        }
        for phase in Phase::EXEC_SEQUENCE {
            self.run_phase(phase)?;
        }
        for unit in &mut self.units {
            unit.copy_output_to_host()?;
        }
        Ok(())
    }

    /// Maximum of `key` across units
    fn stat(&self, key: &str) -> Option<u64> {
        self.units.iter().filter_map(|u| u.stat(key)).max()
    }

    fn stat_keys(&self) -> &'static [&'static str] {
        HARDWARE_STAT_KEYS
    }
}

impl<B: RegisterBus, I: SparseIndex, V: Element> Drop for ParallelOrchestrator<'_, B, I, V> {
    fn drop(&mut self) {
        self.units.clear();
        self.bus.detach();
        debug!("orchestrator detached");
    }
}
