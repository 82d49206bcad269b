//! One hardware SpMV processing element

use std::marker::PhantomData;
use std::mem::size_of;

use tracing::{debug, trace, warn};

use super::state::{PhaseState, PhaseTracker};
use crate::dtype::{self, Element, SparseIndex};
use crate::error::{Error, Result};
use crate::executor::{SpmvExecutor, HARDWARE_STAT_KEYS, STAT_CYCLES_REGULAR};
use crate::runtime::regs::MAX_OUTSTANDING_TXNS;
use crate::runtime::{
    poll_until, CancelToken, DeviceBuffer, Phase, PollPolicy, RegisterBlock, RegisterBus,
};
use crate::sparse::{SparseMatrix, SparseStorage};

/// Device-side copies of one matrix and its vectors
#[derive(Debug)]
struct DeviceBuffers {
    pointers: DeviceBuffer,
    indices: DeviceBuffer,
    values: DeviceBuffer,
    input: DeviceBuffer,
    output: DeviceBuffer,
}

impl DeviceBuffers {
    fn allocate<B: RegisterBus>(bus: &B, sizes: [usize; 5]) -> Result<Self> {
        let mut allocated: Vec<DeviceBuffer> = Vec::with_capacity(sizes.len());
        for size in sizes {
            match DeviceBuffer::alloc(bus, size) {
                Ok(buf) => allocated.push(buf),
                Err(e) => {
                    for buf in allocated {
                        buf.release(bus);
                    }
                    return Err(e);
                }
            }
        }
        match allocated[..] {
            [pointers, indices, values, input, output] => Ok(Self {
                pointers,
                indices,
                values,
                input,
                output,
            }),
            _ => Err(Error::Bus("device buffer allocation came up short".into())),
        }
    }

    fn release<B: RegisterBus>(self, bus: &B) {
        for buf in [self.pointers, self.indices, self.values, self.input, self.output] {
            buf.release(bus);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct UnitShape {
    rows: usize,
    cols: usize,
}

fn to_reg(arg: &'static str, value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::invalid_argument(arg, format!("{} does not fit a 32-bit register", value)))
}

/// Executor driving one PE's register block
///
/// The matrix is copied to device memory by `set_matrix`; the vectors are
/// copied when bound and again at the start of every `exec`, and the output
/// is copied back after FLUSH. `exec` runs INIT, REGULAR and FLUSH to
/// completion, polling the finished register under the unit's
/// [`PollPolicy`].
///
/// For lock-step operation across units, [`set_phase`](Self::set_phase) and
/// [`is_finished`](Self::is_finished) split a phase into its start and
/// completion halves.
///
/// A unit created with [`attach`](Self::attach) owns the bus attachment and
/// detaches on drop. Device buffers are always released on drop.
pub struct AcceleratorUnit<'a, B: RegisterBus, I: SparseIndex, V: Element> {
    regs: RegisterBlock<B>,
    attached: bool,
    buffers: Option<DeviceBuffers>,
    shape: Option<UnitShape>,
    x: Option<&'a [V]>,
    y: Option<&'a mut [V]>,
    tracker: PhaseTracker,
    cycles_regular: u32,
    poll: PollPolicy,
    cancel: CancelToken,
    _index: PhantomData<fn() -> I>,
}

impl<'a, B: RegisterBus, I: SparseIndex, V: Element> AcceleratorUnit<'a, B, I, V> {
    /// Unit for PE `pe` on an already attached bus
    pub fn new(bus: B, pe: u32) -> Self {
        Self {
            regs: RegisterBlock::new(bus, pe),
            attached: false,
            buffers: None,
            shape: None,
            x: None,
            y: None,
            tracker: PhaseTracker::new(),
            cycles_regular: 0,
            poll: PollPolicy::default(),
            cancel: CancelToken::new(),
            _index: PhantomData,
        }
    }

    /// Attach `bus` under `name` and create a unit for PE `pe` that owns the attachment
    pub fn attach(bus: B, name: &str, pe: u32) -> Result<Self> {
        bus.attach(name)?;
        let mut unit = Self::new(bus, pe);
        unit.attached = true;
        Ok(unit)
    }

    /// Replace the poll policy used for finished-register waits
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Replace the poll policy in place
    pub fn set_poll_policy(&mut self, poll: PollPolicy) {
        self.poll = poll;
    }

    /// Share `cancel` with this unit
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// PE index
    pub fn pe(&self) -> u32 {
        self.regs.pe()
    }

    /// The bus this unit drives
    pub fn bus(&self) -> &B {
        self.regs.bus()
    }

    /// Poll policy in effect
    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Token observed while polling
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Host-side view of the PE's phase state
    pub fn phase_state(&self) -> PhaseState {
        self.tracker.state()
    }

    /// Global signature register
    pub fn signature(&self) -> u32 {
        self.regs.signature()
    }

    /// Pulse the global reset register, resetting every PE on the bus
    pub fn reset_device(&self) {
        self.regs.reset_all()
    }

    /// Clear start and the abort state so the unit can be used again
    pub fn reset(&mut self) {
        self.regs.set_start(false);
        self.tracker.reset();
        self.cancel.reset();
    }

    fn ensure_usable(&self, op: &'static str) -> Result<()> {
        match self.tracker.state() {
            PhaseState::Aborted => Err(Error::precondition(op, "unit was force-exited; reset it first")),
            PhaseState::Running(phase) => Err(Error::precondition(
                op,
                format!("phase {} is still running", phase),
            )),
            PhaseState::Idle { .. } => Ok(()),
        }
    }

    fn release_buffers(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            buffers.release(self.regs.bus());
        }
    }

    /// Copy `matrix` to the device and program the descriptor registers
    ///
    /// Any previous device buffers are released and bound vectors unbound.
    pub fn upload_matrix(&mut self, matrix: &SparseMatrix<I, V>) -> Result<()> {
        self.ensure_usable("set_matrix")?;
        let (rows, cols, nz) = (matrix.nrows(), matrix.ncols(), matrix.nnz());
        let shape_regs = (to_reg("rows", rows)?, to_reg("cols", cols)?, to_reg("nz", nz)?);

        self.release_buffers();
        self.shape = None;
        self.x = None;
        self.y = None;

        let bus = self.regs.bus();
        let buffers = DeviceBuffers::allocate(
            bus,
            [
                matrix.pointers().len() * size_of::<I>(),
                nz * size_of::<I>(),
                nz * size_of::<V>(),
                cols * size_of::<V>(),
                rows * size_of::<V>(),
            ],
        )?;
        let copied = buffers
            .pointers
            .upload(bus, dtype::as_bytes(matrix.pointers()))
            .and_then(|_| buffers.indices.upload(bus, dtype::as_bytes(matrix.indices())))
            .and_then(|_| buffers.values.upload(bus, dtype::as_bytes(matrix.values())));
        if let Err(e) = copied {
            buffers.release(bus);
            return Err(e);
        }

        self.regs.set_col_ptr(buffers.pointers.addr());
        self.regs.set_row_ind(buffers.indices.addr());
        self.regs.set_nz_data(buffers.values.addr());
        self.regs.set_inp_vec(buffers.input.addr());
        self.regs.set_out_vec(buffers.output.addr());
        self.regs.set_shape(shape_regs.0, shape_regs.1, shape_regs.2);

        debug!(
            pe = self.pe(),
            matrix = matrix.name(),
            rows,
            cols,
            nz,
            "matrix uploaded"
        );
        self.buffers = Some(buffers);
        self.shape = Some(UnitShape { rows, cols });
        Ok(())
    }

    fn bound(&self, op: &'static str) -> Result<(&DeviceBuffers, UnitShape)> {
        match (&self.buffers, self.shape) {
            (Some(buffers), Some(shape)) => Ok((buffers, shape)),
            _ => Err(Error::precondition(op, "no matrix assigned")),
        }
    }

    /// Copy the bound vectors to their device buffers
    pub fn push_vectors(&self) -> Result<()> {
        let (buffers, shape) = self.bound("push_vectors")?;
        let (Some(x), Some(y)) = (self.x, self.y.as_deref()) else {
            return Err(Error::precondition(
                "push_vectors",
                "input and output must both be assigned",
            ));
        };
        let bus = self.regs.bus();
        buffers.input.upload(bus, dtype::as_bytes(&x[..shape.cols]))?;
        buffers.output.upload(bus, dtype::as_bytes(&y[..shape.rows]))
    }

    /// Copy the device output buffer into the bound output vector
    pub fn copy_output_to_host(&mut self) -> Result<()> {
        let (buffers, shape) = match (&self.buffers, self.shape) {
            (Some(buffers), Some(shape)) => (buffers, shape),
            _ => return Err(Error::precondition("copy_output_to_host", "no matrix assigned")),
        };
        let Some(y) = self.y.as_deref_mut() else {
            return Err(Error::precondition("copy_output_to_host", "no output assigned"));
        };
        buffers
            .output
            .download(self.regs.bus(), dtype::as_bytes_mut(&mut y[..shape.rows]))
    }

    /// Start (`start = true`) or complete (`start = false`) `phase`
    ///
    /// Starting writes the mode register and asserts start without waiting.
    /// Completing requires the finished register to read 1; it latches the
    /// cycle counter after REGULAR and clears start.
    pub fn set_phase(&mut self, phase: Phase, start: bool) -> Result<()> {
        if start {
            self.tracker.begin(phase)?;
            self.regs.set_mode(phase);
            self.regs.set_start(true);
            trace!(pe = self.pe(), %phase, "start asserted");
            return Ok(());
        }

        if self.tracker.state() != PhaseState::Running(phase) {
            return Err(Error::precondition(
                "set_phase",
                format!("{} is not running on PE {}", phase, self.pe()),
            ));
        }
        if !self.regs.finished() {
            return Err(Error::precondition(
                "set_phase",
                format!("PE {} has not finished {}", self.pe(), phase),
            ));
        }
        if phase == Phase::Regular {
            self.cycles_regular = self.regs.cycle_count();
        }
        self.regs.set_start(false);
        self.tracker.complete(phase)?;
        trace!(pe = self.pe(), %phase, "start cleared");
        Ok(())
    }

    /// Non-blocking read of the finished register
    pub fn is_finished(&self) -> bool {
        self.regs.finished()
    }

    /// Drive one phase to completion
    fn run_phase(&mut self, phase: Phase) -> Result<()> {
        self.set_phase(phase, true)?;
        let regs = &self.regs;
        let waited = poll_until(&self.poll, &self.cancel, phase.name(), || regs.finished());
        if let Err(e) = waited {
            warn!(pe = self.pe(), %phase, error = %e, "abandoning phase");
            self.force_exit();
            return Err(e);
        }
        self.set_phase(phase, false)
    }

    /// Program the outstanding memory transaction count (1..=16) and apply it
    /// with a CONFIG phase
    pub fn set_outstanding_transactions(&mut self, n: u32) -> Result<()> {
        self.program_outstanding_transactions(n)?;
        self.run_phase(Phase::Config)
    }

    /// Write the outstanding transaction count without running CONFIG
    pub fn program_outstanding_transactions(&self, n: u32) -> Result<()> {
        if n == 0 || n > MAX_OUTSTANDING_TXNS {
            return Err(Error::invalid_argument(
                "outstanding_transactions",
                format!("{} is outside 1..={}", n, MAX_OUTSTANDING_TXNS),
            ));
        }
        self.ensure_usable("set_outstanding_transactions")?;
        self.regs.set_outstanding_txns(n);
        Ok(())
    }

    /// Clear start and mark the unit aborted
    ///
    /// The device is left in an undefined state; call [`reset`](Self::reset)
    /// (and usually [`reset_device`](Self::reset_device)) before reuse.
    pub fn force_exit(&mut self) {
        warn!(pe = self.pe(), state = ?self.tracker.state(), "forced exit");
        self.regs.set_start(false);
        self.tracker.abort();
    }
}

impl<'a, B: RegisterBus, I: SparseIndex, V: Element> SpmvExecutor<'a, I, V>
    for AcceleratorUnit<'a, B, I, V>
{
    fn set_matrix(&mut self, matrix: &'a SparseMatrix<I, V>) -> Result<()> {
        self.upload_matrix(matrix)
    }

    fn set_input(&mut self, x: &'a [V]) -> Result<()> {
        let (buffers, shape) = self.bound("set_input")?;
        if x.len() < shape.cols {
            return Err(Error::ShapeMismatch {
                what: "input vector",
                expected: shape.cols,
                got: x.len(),
            });
        }
        buffers
            .input
            .upload(self.regs.bus(), dtype::as_bytes(&x[..shape.cols]))?;
        self.x = Some(x);
        Ok(())
    }

    fn set_output(&mut self, y: &'a mut [V]) -> Result<()> {
        let (buffers, shape) = self.bound("set_output")?;
        if y.len() < shape.rows {
            return Err(Error::ShapeMismatch {
                what: "output vector",
                expected: shape.rows,
                got: y.len(),
            });
        }
        buffers
            .output
            .upload(self.regs.bus(), dtype::as_bytes(&y[..shape.rows]))?;
        self.y = Some(y);
        Ok(())
    }

    fn exec(&mut self) -> Result<()> {
        self.ensure_usable("exec")?;
        if self.buffers.is_none() || self.x.is_none() || self.y.is_none() {
            return Err(Error::precondition(
                "exec",
                "matrix, input and output must all be assigned",
            ));
        }
        self.push_vectors()?;
        for phase in Phase::EXEC_SEQUENCE {
            self.run_phase(phase)?;
        }
        self.copy_output_to_host()
    }

    fn stat(&self, key: &str) -> Option<u64> {
        match key {
            STAT_CYCLES_REGULAR => Some(u64::from(self.cycles_regular)),
            _ => None,
        }
    }

    fn stat_keys(&self) -> &'static [&'static str] {
        HARDWARE_STAT_KEYS
    }
}

impl<B: RegisterBus, I: SparseIndex, V: Element> Drop for AcceleratorUnit<'_, B, I, V> {
    fn drop(&mut self) {
        self.release_buffers();
        if self.attached {
            self.regs.bus().detach();
        }
    }
}
