//! Device register map for the SpMV processing element
//!
//! Each PE exposes a block of 18 registers, numbered 1..=18 within the block.
//! PE `p`'s register `r` lives at bus index `p * 18 + r`. Register 0 is the
//! global signature register and is never offset; writing 1 then 0 to it
//! resets every PE.
//!
//! 64-bit device addresses occupy two consecutive registers, high word first.

use serde::{Deserialize, Serialize};

use super::bus::RegisterBus;

/// Number of registers in one PE block
pub const REGS_PER_PE: u32 = 18;

/// Global signature / reset register
pub const REG_SIGNATURE: u32 = 0;
/// Start signal
pub const REG_START: u32 = 1;
/// Operating mode, see [`Phase`]
pub const REG_MODE: u32 = 2;
/// Finished flag
pub const REG_FINISHED: u32 = 3;
/// Pointer array address, high word
pub const REG_COL_PTR_HI: u32 = 4;
/// Pointer array address, low word
pub const REG_COL_PTR_LO: u32 = 5;
/// Index array address, high word
pub const REG_ROW_IND_HI: u32 = 6;
/// Index array address, low word
pub const REG_ROW_IND_LO: u32 = 7;
/// Value array address, high word
pub const REG_NZ_DATA_HI: u32 = 8;
/// Value array address, low word
pub const REG_NZ_DATA_LO: u32 = 9;
/// Input vector address, high word
pub const REG_INP_VEC_HI: u32 = 10;
/// Input vector address, low word
pub const REG_INP_VEC_LO: u32 = 11;
/// Output vector address, high word
pub const REG_OUT_VEC_HI: u32 = 12;
/// Output vector address, low word
pub const REG_OUT_VEC_LO: u32 = 13;
/// Row count
pub const REG_ROWS: u32 = 14;
/// Column count
pub const REG_COLS: u32 = 15;
/// Nonzero count
pub const REG_NZ: u32 = 16;
/// Cycle counter
pub const REG_CYCLE_COUNT: u32 = 17;
/// Outstanding memory transactions
pub const REG_OUTSTANDING_TXNS: u32 = 18;

/// Hardware ceiling on outstanding memory transactions
pub const MAX_OUTSTANDING_TXNS: u32 = 16;

/// Device operating mode, as written to [`REG_MODE`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Phase {
    /// Stream the matrix and accumulate into the output
    Regular = 0,
    /// Prepare the accumulator from the output buffer
    Init = 1,
    /// Write accumulated results back to the output buffer
    Flush = 2,
    /// Apply configuration registers
    Config = 3,
}

impl Phase {
    /// The execution path, in order
    pub const EXEC_SEQUENCE: [Phase; 3] = [Phase::Init, Phase::Regular, Phase::Flush];

    /// Encoded mode register value
    #[inline]
    pub fn mode(self) -> u32 {
        self as u32
    }

    /// Decode a mode register value
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode {
            0 => Some(Phase::Regular),
            1 => Some(Phase::Init),
            2 => Some(Phase::Flush),
            3 => Some(Phase::Config),
            _ => None,
        }
    }

    /// Phase name
    pub fn name(self) -> &'static str {
        match self {
            Phase::Regular => "REGULAR",
            Phase::Init => "INIT",
            Phase::Flush => "FLUSH",
            Phase::Config => "CONFIG",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Bus index of PE `pe`'s register `reg` (1..=18)
#[inline]
pub const fn reg_index(pe: u32, reg: u32) -> u32 {
    pe * REGS_PER_PE + reg
}

/// Inverse of [`reg_index`]: `(pe, reg)` for a PE-local bus index
#[inline]
pub const fn split_index(idx: u32) -> Option<(u32, u32)> {
    if idx == REG_SIGNATURE {
        return None;
    }
    let reg = (idx - 1) % REGS_PER_PE + 1;
    Some(((idx - reg) / REGS_PER_PE, reg))
}

/// Register accessors for one PE
#[derive(Debug, Clone)]
pub struct RegisterBlock<B> {
    bus: B,
    pe: u32,
}

impl<B: RegisterBus> RegisterBlock<B> {
    /// Register block of PE `pe` on `bus`
    pub fn new(bus: B, pe: u32) -> Self {
        Self { bus, pe }
    }

    /// PE index
    pub fn pe(&self) -> u32 {
        self.pe
    }

    /// The underlying bus
    pub fn bus(&self) -> &B {
        &self.bus
    }

    #[inline]
    fn read(&self, reg: u32) -> u32 {
        self.bus.read_reg(reg_index(self.pe, reg))
    }

    #[inline]
    fn write(&self, reg: u32, value: u32) {
        self.bus.write_reg(reg_index(self.pe, reg), value)
    }

    fn write_addr(&self, hi: u32, addr: u64) {
        self.write(hi, (addr >> 32) as u32);
        self.write(hi + 1, (addr & 0xffff_ffff) as u32);
    }

    /// Global signature register
    pub fn signature(&self) -> u32 {
        self.bus.read_reg(REG_SIGNATURE)
    }

    /// Pulse the global reset (register 0: write 1, then 0)
    pub fn reset_all(&self) {
        self.bus.write_reg(REG_SIGNATURE, 1);
        self.bus.write_reg(REG_SIGNATURE, 0);
    }

    /// Drive the start signal
    pub fn set_start(&self, start: bool) {
        self.write(REG_START, start as u32)
    }

    /// Select the operating mode
    pub fn set_mode(&self, phase: Phase) {
        self.write(REG_MODE, phase.mode())
    }

    /// Finished flag
    pub fn finished(&self) -> bool {
        self.read(REG_FINISHED) == 1
    }

    /// Pointer array address
    pub fn set_col_ptr(&self, addr: u64) {
        self.write_addr(REG_COL_PTR_HI, addr)
    }

    /// Index array address
    pub fn set_row_ind(&self, addr: u64) {
        self.write_addr(REG_ROW_IND_HI, addr)
    }

    /// Value array address
    pub fn set_nz_data(&self, addr: u64) {
        self.write_addr(REG_NZ_DATA_HI, addr)
    }

    /// Input vector address
    pub fn set_inp_vec(&self, addr: u64) {
        self.write_addr(REG_INP_VEC_HI, addr)
    }

    /// Output vector address
    pub fn set_out_vec(&self, addr: u64) {
        self.write_addr(REG_OUT_VEC_HI, addr)
    }

    /// Matrix dimensions
    pub fn set_shape(&self, rows: u32, cols: u32, nz: u32) {
        self.write(REG_ROWS, rows);
        self.write(REG_COLS, cols);
        self.write(REG_NZ, nz);
    }

    /// Cycle counter
    pub fn cycle_count(&self) -> u32 {
        self.read(REG_CYCLE_COUNT)
    }

    /// Outstanding memory transactions
    pub fn set_outstanding_txns(&self, n: u32) {
        self.write(REG_OUTSTANDING_TXNS, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_index_layout() {
        assert_eq!(reg_index(0, REG_START), 1);
        assert_eq!(reg_index(0, REG_OUTSTANDING_TXNS), 18);
        assert_eq!(reg_index(1, REG_START), 19);
        assert_eq!(reg_index(3, REG_CYCLE_COUNT), 3 * 18 + 17);
    }

    #[test]
    fn test_split_index() {
        assert_eq!(split_index(0), None);
        for pe in 0..4 {
            for reg in 1..=REGS_PER_PE {
                assert_eq!(split_index(reg_index(pe, reg)), Some((pe, reg)));
            }
        }
    }

    #[test]
    fn test_mode_encoding() {
        assert_eq!(Phase::Regular.mode(), 0);
        assert_eq!(Phase::Init.mode(), 1);
        assert_eq!(Phase::Flush.mode(), 2);
        assert_eq!(Phase::Config.mode(), 3);
        assert_eq!(Phase::from_mode(2), Some(Phase::Flush));
        assert_eq!(Phase::from_mode(4), None);
    }
}
