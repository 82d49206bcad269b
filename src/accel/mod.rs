//! Hardware SpMV executors
//!
//! [`AcceleratorUnit`] drives a single PE through INIT, REGULAR and FLUSH.
//! [`ParallelOrchestrator`] partitions a matrix across many units and runs
//! them in lock-step, one barrier per phase.
//!
//! # Example
//!
//! ```
//! # #[cfg(feature = "sim")]
//! # {
//! use seyrek::accel::ParallelOrchestrator;
//! use seyrek::executor::SpmvExecutor;
//! use seyrek::runtime::SimulatedBus;
//! use seyrek::sparse::{Orientation, SparseMatrix};
//!
//! let bus = SimulatedBus::<u32, i64>::with_pes(2, Orientation::Csr);
//! let a = SparseMatrix::<u32, i64>::identity(Orientation::Csr, 8)?;
//! let x: Vec<i64> = (0..8).collect();
//! let mut y = vec![0i64; 8];
//! {
//!     let mut orch = ParallelOrchestrator::new(bus, 2, "doc")?;
//!     orch.set_matrix(&a)?;
//!     orch.set_input(&x)?;
//!     orch.set_output(&mut y)?;
//!     orch.exec()?;
//! }
//! assert_eq!(y, x);
//! # }
//! # Ok::<(), seyrek::error::Error>(())
//! ```

mod parallel;
mod state;
mod unit;

pub use parallel::{ParallelOrchestrator, MAX_PES};
pub use state::{PhaseState, PhaseTracker};
pub use unit::AcceleratorUnit;
