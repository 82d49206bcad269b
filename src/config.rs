//! Orchestrator configuration
//!
//! [`SpmvConfig`] gathers everything needed to bring up a
//! [`ParallelOrchestrator`](crate::accel::ParallelOrchestrator). It is
//! serializable so it can live next to the matrices it is used with; missing
//! fields take their defaults.
//!
//! ```
//! use seyrek::config::SpmvConfig;
//!
//! let cfg = SpmvConfig { num_pes: 4, ..SpmvConfig::default() };
//! cfg.validate()?;
//! # Ok::<(), seyrek::error::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use crate::accel::MAX_PES;
use crate::error::{Error, Result};
use crate::runtime::regs::MAX_OUTSTANDING_TXNS;
use crate::runtime::PollPolicy;

/// Bring-up parameters for a PE array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpmvConfig {
    /// Number of PEs to drive (1..=64)
    pub num_pes: u32,
    /// Name the bus is attached under
    pub attach_name: String,
    /// Bounds on every finished-register wait
    pub poll: PollPolicy,
    /// Outstanding memory transactions per PE (1..=16), applied with a
    /// CONFIG phase after attach. `None` keeps the device default.
    pub outstanding_transactions: Option<u32>,
    /// Pulse the global reset register after attach
    pub reset_on_attach: bool,
}

impl Default for SpmvConfig {
    fn default() -> Self {
        Self {
            num_pes: 1,
            attach_name: "seyrek".to_string(),
            poll: PollPolicy::default(),
            outstanding_transactions: None,
            reset_on_attach: true,
        }
    }
}

impl SpmvConfig {
    /// Check every field against its valid range
    pub fn validate(&self) -> Result<()> {
        if self.num_pes == 0 || self.num_pes > MAX_PES {
            return Err(Error::invalid_argument(
                "num_pes",
                format!("{} is outside 1..={}", self.num_pes, MAX_PES),
            ));
        }
        if self.attach_name.is_empty() {
            return Err(Error::invalid_argument("attach_name", "must not be empty"));
        }
        if let Some(n) = self.outstanding_transactions {
            if n == 0 || n > MAX_OUTSTANDING_TXNS {
                return Err(Error::invalid_argument(
                    "outstanding_transactions",
                    format!("{} is outside 1..={}", n, MAX_OUTSTANDING_TXNS),
                ));
            }
        }
        if self.poll.max_polls == Some(0) {
            return Err(Error::invalid_argument("poll.max_polls", "must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_is_valid() {
        let cfg = SpmvConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.num_pes, 1);
        assert_eq!(cfg.poll.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_pe_count_bounds() {
        for bad in [0, 65] {
            let cfg = SpmvConfig {
                num_pes: bad,
                ..SpmvConfig::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(Error::InvalidArgument { arg: "num_pes", .. })
            ));
        }
        let cfg = SpmvConfig {
            num_pes: 64,
            ..SpmvConfig::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn test_transaction_bounds() {
        let cfg = SpmvConfig {
            outstanding_transactions: Some(17),
            ..SpmvConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
