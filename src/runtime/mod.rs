//! Host-side device runtime
//!
//! Everything the accelerator executors need to talk to hardware:
//!
//! ```text
//! RegisterBus (attach, 32-bit registers, device memory)
//! ├── RegisterBlock (typed accessors for one PE's 18 registers)
//! ├── DeviceBuffer (allocation + bounds-checked copies)
//! └── poll_until (bounded, cancellable busy-wait)
//! ```
//!
//! With the `sim` feature (default), [`sim::SimulatedBus`] provides an
//! in-process device model implementing the same register protocol.

mod bus;
mod poll;
pub mod regs;

#[cfg(feature = "sim")]
pub mod sim;

pub use bus::{DeviceBuffer, RegisterBus};
pub use poll::{poll_until, CancelToken, PollPolicy};
pub use regs::{Phase, RegisterBlock};

#[cfg(feature = "sim")]
pub use sim::{SimConfig, SimulatedBus};
