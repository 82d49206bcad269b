//! Software model of the SpMV PE array behind a register bus
//!
//! [`SimulatedBus`] implements [`RegisterBus`] over an in-memory register file
//! and a bump-allocated device memory. Asserting a PE's start register runs the
//! selected phase against device memory, using the arithmetic semiring:
//!
//! - INIT loads the output buffer into the PE's accumulator
//! - REGULAR accumulates `A * x` and latches a cycle count
//! - FLUSH writes the accumulator back to the output buffer
//! - CONFIG latches the outstanding-transactions register
//!
//! The finished register reads 0 for a configurable number of polls after
//! start, so PEs can be given different latencies, and a PE can be stalled so
//! that it never finishes.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use super::bus::RegisterBus;
use super::regs::{self, Phase};
use crate::dtype::{self, Element, SparseIndex};
use crate::error::{Error, Result};
use crate::sparse::Orientation;

/// Signature register value reported by the model
pub const SIM_SIGNATURE: u32 = 0x5E1_2E4B;

/// Base address of simulated device memory
pub const SIM_DRAM_BASE: u64 = 0x0800_0100;

const SIM_ALIGN: u64 = 64;

/// Shape of the simulated device
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Number of PEs with a register block
    pub num_pes: u32,
    /// Storage orientation the PEs stream
    pub orientation: Orientation,
    /// Device memory capacity in bytes
    pub memory_bytes: usize,
    /// Per-PE number of finished-register polls that read 0 after start.
    /// PEs beyond the end of the list finish on the first poll.
    pub latencies: Vec<u32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_pes: 64,
            orientation: Orientation::Csr,
            memory_bytes: 64 << 20,
            latencies: Vec::new(),
        }
    }
}

/// A start or clear edge observed on some PE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimEvent {
    /// Start asserted in the given phase
    Start {
        /// PE index
        pe: u32,
        /// Mode at the time of the edge
        phase: Phase,
    },
    /// Start cleared
    Clear {
        /// PE index
        pe: u32,
    },
}

#[derive(Debug)]
struct PeModel<V> {
    acc: Vec<V>,
    pending_polls: u32,
    running: bool,
    stalled: bool,
    outstanding_txns: u32,
}

struct SimState<I, V> {
    config: SimConfig,
    attached: Option<String>,
    regs: Vec<u32>,
    memory: BTreeMap<u64, Vec<u8>>,
    next_addr: u64,
    used: usize,
    pes: Vec<PeModel<V>>,
    events: Vec<SimEvent>,
    faults: Vec<String>,
    _index: PhantomData<fn() -> I>,
}

/// Simulated register bus, see the module docs
///
/// Clones share the same device.
pub struct SimulatedBus<I, V> {
    state: Arc<Mutex<SimState<I, V>>>,
}

impl<I, V> Clone for SimulatedBus<I, V> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<I: SparseIndex, V: Element> SimulatedBus<I, V> {
    /// Create a device from `config`
    pub fn new(config: SimConfig) -> Self {
        let num_pes = config.num_pes as usize;
        let state = SimState {
            regs: vec![0; 1 + num_pes * regs::REGS_PER_PE as usize],
            memory: BTreeMap::new(),
            next_addr: SIM_DRAM_BASE,
            used: 0,
            pes: (0..num_pes)
                .map(|_| PeModel {
                    acc: Vec::new(),
                    pending_polls: 0,
                    running: false,
                    stalled: false,
                    outstanding_txns: 0,
                })
                .collect(),
            events: Vec::new(),
            faults: Vec::new(),
            attached: None,
            config,
            _index: PhantomData,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A device with `num_pes` PEs streaming `orientation` matrices
    pub fn with_pes(num_pes: u32, orientation: Orientation) -> Self {
        Self::new(SimConfig {
            num_pes,
            orientation,
            ..SimConfig::default()
        })
    }

    /// Set the number of polls PE `pe` reads as unfinished after each start
    pub fn set_latency(&self, pe: u32, polls: u32) {
        let mut state = self.state.lock();
        let pe = pe as usize;
        if state.config.latencies.len() <= pe {
            state.config.latencies.resize(pe + 1, 0);
        }
        state.config.latencies[pe] = polls;
    }

    /// Make PE `pe` never (or again) report finished
    pub fn set_stalled(&self, pe: u32, stalled: bool) {
        if let Some(model) = self.state.lock().pes.get_mut(pe as usize) {
            model.stalled = stalled;
        }
    }

    /// Name passed to the current `attach`, if attached
    pub fn attached_name(&self) -> Option<String> {
        self.state.lock().attached.clone()
    }

    /// Bytes of device memory currently allocated
    pub fn allocated_bytes(&self) -> usize {
        self.state.lock().used
    }

    /// Number of live device allocations
    pub fn live_buffers(&self) -> usize {
        self.state.lock().memory.len()
    }

    /// Outstanding transactions latched by PE `pe`'s last CONFIG phase
    pub fn outstanding_txns(&self, pe: u32) -> Option<u32> {
        self.state
            .lock()
            .pes
            .get(pe as usize)
            .map(|m| m.outstanding_txns)
    }

    /// Raw register value, bypassing finished-register latency
    pub fn peek_reg(&self, idx: u32) -> u32 {
        self.state
            .lock()
            .regs
            .get(idx as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Start/clear edges observed so far
    pub fn events(&self) -> Vec<SimEvent> {
        self.state.lock().events.clone()
    }

    /// Forget recorded events
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Phase executions that failed (bad address, out of range index, ...)
    pub fn faults(&self) -> Vec<String> {
        self.state.lock().faults.clone()
    }
}

impl<I: SparseIndex, V: Element> SimState<I, V> {
    fn region(&self, addr: u64, len: usize) -> std::result::Result<(u64, usize), String> {
        let (&base, buf) = self
            .memory
            .range(..=addr)
            .next_back()
            .ok_or_else(|| format!("address {:#x} is not allocated", addr))?;
        let offset = (addr - base) as usize;
        if offset + len > buf.len() {
            return Err(format!(
                "access of {} bytes at {:#x} overruns {}-byte buffer at {:#x}",
                len,
                addr,
                buf.len(),
                base
            ));
        }
        Ok((base, offset))
    }

    fn read_vec<T: bytemuck::Pod>(&self, addr: u64, count: usize) -> std::result::Result<Vec<T>, String> {
        let len = count * std::mem::size_of::<T>();
        let (base, offset) = self.region(addr, len)?;
        let bytes = &self.memory[&base][offset..offset + len];
        dtype::decode_pod_slice(bytes).ok_or_else(|| "misaligned element data".to_string())
    }

    fn write_bytes(&mut self, addr: u64, src: &[u8]) -> std::result::Result<(), String> {
        let (base, offset) = self.region(addr, src.len())?;
        if let Some(buf) = self.memory.get_mut(&base) {
            buf[offset..offset + src.len()].copy_from_slice(src);
        }
        Ok(())
    }

    fn reg(&self, pe: u32, reg: u32) -> u32 {
        self.regs[regs::reg_index(pe, reg) as usize]
    }

    fn addr(&self, pe: u32, hi: u32) -> u64 {
        (u64::from(self.reg(pe, hi)) << 32) | u64::from(self.reg(pe, hi + 1))
    }

    fn execute(&mut self, pe: u32, phase: Phase) -> std::result::Result<(), String> {
        let rows = self.reg(pe, regs::REG_ROWS) as usize;
        let cols = self.reg(pe, regs::REG_COLS) as usize;
        let nz = self.reg(pe, regs::REG_NZ) as usize;
        let out = self.addr(pe, regs::REG_OUT_VEC_HI);

        match phase {
            Phase::Init => {
                self.pes[pe as usize].acc = self.read_vec::<V>(out, rows)?;
            }
            Phase::Regular => {
                let orientation = self.config.orientation;
                let primary = orientation.primary_dim(rows, cols);
                let ptrs: Vec<I> = self.read_vec(self.addr(pe, regs::REG_COL_PTR_HI), primary + 1)?;
                let inds: Vec<I> = self.read_vec(self.addr(pe, regs::REG_ROW_IND_HI), nz)?;
                let vals: Vec<V> = self.read_vec(self.addr(pe, regs::REG_NZ_DATA_HI), nz)?;
                let x: Vec<V> = self.read_vec(self.addr(pe, regs::REG_INP_VEC_HI), cols)?;

                let acc = &mut self.pes[pe as usize].acc;
                if acc.len() != rows {
                    return Err(format!("REGULAR without INIT on PE {}", pe));
                }
                for p in 0..primary {
                    for e in ptrs[p].index()..ptrs[p + 1].index() {
                        let (row, col) = match orientation {
                            Orientation::Csr => (p, inds[e].index()),
                            Orientation::Csc => (inds[e].index(), p),
                        };
                        if row >= rows || col >= cols {
                            return Err(format!("nonzero ({}, {}) out of range on PE {}", row, col, pe));
                        }
                        acc[row] = acc[row].wrapping_add(vals[e].wrapping_mul(x[col]));
                    }
                }

                let latency = self.config.latencies.get(pe as usize).copied().unwrap_or(0);
                let cycles = (nz + primary) as u32 + latency;
                self.regs[regs::reg_index(pe, regs::REG_CYCLE_COUNT) as usize] = cycles;
            }
            Phase::Flush => {
                let acc = std::mem::take(&mut self.pes[pe as usize].acc);
                self.write_bytes(out, dtype::as_bytes(&acc))?;
            }
            Phase::Config => {
                self.pes[pe as usize].outstanding_txns = self.reg(pe, regs::REG_OUTSTANDING_TXNS);
            }
        }
        Ok(())
    }

    fn start(&mut self, pe: u32) {
        let mode = self.reg(pe, regs::REG_MODE);
        let Some(phase) = Phase::from_mode(mode) else {
            self.faults.push(format!("PE {} started with invalid mode {}", pe, mode));
            return;
        };
        if let Err(fault) = self.execute(pe, phase) {
            tracing::warn!(pe, %phase, %fault, "simulated phase failed");
            self.faults.push(fault);
        }
        let latency = self.config.latencies.get(pe as usize).copied().unwrap_or(0);
        let model = &mut self.pes[pe as usize];
        model.running = true;
        model.pending_polls = latency;
        self.events.push(SimEvent::Start { pe, phase });
        tracing::trace!(pe, %phase, latency, "simulated start");
    }

    fn clear(&mut self, pe: u32) {
        self.pes[pe as usize].running = false;
        self.regs[regs::reg_index(pe, regs::REG_FINISHED) as usize] = 0;
        self.events.push(SimEvent::Clear { pe });
    }

    fn reset(&mut self) {
        for pe in 0..self.pes.len() as u32 {
            let model = &mut self.pes[pe as usize];
            model.running = false;
            model.acc.clear();
            self.regs[regs::reg_index(pe, regs::REG_START) as usize] = 0;
            self.regs[regs::reg_index(pe, regs::REG_FINISHED) as usize] = 0;
        }
    }
}

impl<I: SparseIndex, V: Element> RegisterBus for SimulatedBus<I, V> {
    fn attach(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(current) = &state.attached {
            return Err(Error::Bus(format!("already attached to '{}'", current)));
        }
        state.attached = Some(name.to_string());
        Ok(())
    }

    fn detach(&self) {
        self.state.lock().attached = None;
    }

    fn read_reg(&self, idx: u32) -> u32 {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if idx == regs::REG_SIGNATURE {
            return SIM_SIGNATURE;
        }
        let Some((pe, reg)) = regs::split_index(idx) else {
            return 0;
        };
        if pe >= state.config.num_pes {
            return 0;
        }
        if reg == regs::REG_FINISHED {
            let model = &mut state.pes[pe as usize];
            if model.running && !model.stalled {
                if model.pending_polls > 0 {
                    model.pending_polls -= 1;
                } else {
                    state.regs[idx as usize] = 1;
                }
            }
        }
        state.regs[idx as usize]
    }

    fn write_reg(&self, idx: u32, value: u32) {
        let mut state = self.state.lock();
        if idx == regs::REG_SIGNATURE {
            if value == 1 {
                state.reset();
            }
            return;
        }
        let Some((pe, reg)) = regs::split_index(idx) else {
            return;
        };
        if pe >= state.config.num_pes {
            tracing::warn!(idx, pe, "write to register of a PE the device does not have");
            return;
        }
        let previous = std::mem::replace(&mut state.regs[idx as usize], value);
        if reg == regs::REG_START {
            match (previous, value) {
                (0, 1) => state.start(pe),
                (1, 0) => state.clear(pe),
                _ => {}
            }
        }
    }

    fn alloc_device_buffer(&self, size_bytes: usize) -> Result<u64> {
        let mut state = self.state.lock();
        let available = state.config.memory_bytes.saturating_sub(state.used);
        if size_bytes > available {
            return Err(Error::ResourceExhausted {
                requested: size_bytes,
                available,
            });
        }
        let addr = state.next_addr;
        let span = (size_bytes as u64).max(1).div_ceil(SIM_ALIGN) * SIM_ALIGN;
        state.next_addr += span;
        state.used += size_bytes;
        state.memory.insert(addr, vec![0u8; size_bytes]);
        Ok(addr)
    }

    fn dealloc_device_buffer(&self, addr: u64) {
        let mut state = self.state.lock();
        match state.memory.remove(&addr) {
            Some(buf) => state.used -= buf.len(),
            None => tracing::warn!(addr, "dealloc of unknown device buffer"),
        }
    }

    fn copy_host_to_device(&self, src: &[u8], dst: u64) -> Result<()> {
        self.state.lock().write_bytes(dst, src).map_err(Error::Bus)
    }

    fn copy_device_to_host(&self, src: u64, dst: &mut [u8]) -> Result<()> {
        let state = self.state.lock();
        let (base, offset) = state.region(src, dst.len()).map_err(Error::Bus)?;
        dst.copy_from_slice(&state.memory[&base][offset..offset + dst.len()]);
        Ok(())
    }
}
