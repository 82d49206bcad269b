//! # seyrek
//!
//! **Semiring sparse matrix-vector multiplication, in software or on register-mapped PEs.**
//!
//! seyrek computes `y = y ⊕ (A ⊗ x)` for a sparse matrix `A` stored as CSR or
//! CSC, where `⊕`/`⊗` come from a pluggable [`Semiring`](semiring::Semiring):
//! ordinary arithmetic, min-plus shortest paths or boolean reachability.
//!
//! ## Executors
//!
//! - [`SoftwareExecutor`](executor::software::SoftwareExecutor): single-threaded CPU reference
//! - [`AcceleratorUnit`](accel::AcceleratorUnit): one hardware processing element
//!   driven through its 18-register block
//! - [`ParallelOrchestrator`](accel::ParallelOrchestrator): up to 64 PEs, one
//!   row partition each, run in lock-step
//!
//! All three implement [`SpmvExecutor`](executor::SpmvExecutor).
//!
//! ## Quick Start
//!
//! ```rust
//! use seyrek::prelude::*;
//!
//! let a = SparseMatrix::<u32, f64>::identity(Orientation::Csr, 3)?;
//! let x = [10.0, 20.0, 30.0];
//! let mut y = [0.0; 3];
//! {
//!     let mut exec = SoftwareExecutor::new(AddMulSemiring);
//!     exec.set_matrix(&a)?;
//!     exec.set_input(&x)?;
//!     exec.set_output(&mut y)?;
//!     exec.exec()?;
//! }
//! assert_eq!(y, x);
//! # Ok::<(), seyrek::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `sim` (default): [`SimulatedBus`](runtime::SimulatedBus), an in-process
//!   model of the PE array for testing without hardware

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod accel;
pub mod config;
pub mod dtype;
pub mod error;
pub mod executor;
pub mod runtime;
pub mod semiring;
pub mod sparse;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::accel::{AcceleratorUnit, ParallelOrchestrator};
    pub use crate::config::SpmvConfig;
    pub use crate::dtype::{Element, SparseIndex};
    pub use crate::error::{Error, Result};
    pub use crate::executor::software::SoftwareExecutor;
    pub use crate::executor::SpmvExecutor;
    pub use crate::runtime::{CancelToken, Phase, PollPolicy, RegisterBus};
    pub use crate::semiring::{AddMulSemiring, MinPlusSemiring, OrAndSemiring, Semiring};
    pub use crate::sparse::{MatrixStore, Orientation, SparseMatrix, SparseStorage};

    #[cfg(feature = "sim")]
    pub use crate::runtime::SimulatedBus;
}
