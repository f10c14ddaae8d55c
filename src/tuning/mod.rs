//! Per-task resource tuning.
//!
//! Before a block op is dispatched, the [`Autotuner`] asks the [`CostRegistry`] how many bytes
//! the op needs and converts that into a number of compute units, assuming memory is spread
//! uniformly over the cores of the cluster.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

use crate::loom::ops::BlockOp;

pub use cost::{CostError, CostRegistry};
pub use variant::{TaskVariant, VariantRegistry};

pub mod cost;
pub mod variant;

/// Estimate used when no cost model can price an op. Treated as negligible.
pub const MINIMAL_ESTIMATE: usize = 1;

/// Number of compute units reserved for one task. Never zero.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into, Serialize, Deserialize,
)]
pub struct Reservation(pub usize);

/// Cores and memory of the cluster, read-only once the runtime starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterProfile {
    pub total_cores: usize,
    /// Bytes of memory available to each core.
    pub memory_per_core: usize,
}

impl Default for ClusterProfile {
    /// One node of 48 cores sharing 92 GiB.
    fn default() -> Self {
        let total_cores = 48;
        Self {
            total_cores,
            memory_per_core: 92 * 1024 * 1024 * 1024 / total_cores,
        }
    }
}

impl ClusterProfile {
    pub fn new(total_cores: usize, memory_per_core: usize) -> Self {
        Self {
            total_cores,
            memory_per_core,
        }
    }

    #[inline]
    pub fn total_memory(&self) -> usize {
        self.total_cores.saturating_mul(self.memory_per_core)
    }

    /// `ceil(total_cores * bytes / total_memory)`, kept within `1..=total_cores`.
    pub fn parallelism(&self, bytes: usize) -> Reservation {
        let cores = self.total_cores.max(1);
        let memory = self.total_memory().max(1) as u128;
        let units = (cores as u128 * bytes as u128).div_ceil(memory);
        if units > cores as u128 {
            log::warn!("estimate of {bytes} bytes exceeds cluster memory of {memory} bytes");
        }
        Reservation(units.clamp(1, cores as u128) as usize)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Autotuner {
    profile: ClusterProfile,
    registry: CostRegistry,
}

impl Autotuner {
    pub fn new(profile: ClusterProfile, registry: CostRegistry) -> Self {
        Self { profile, registry }
    }

    #[inline]
    pub fn profile(&self) -> &ClusterProfile {
        &self.profile
    }

    /// Bytes `op` is expected to need. Falls back to [`MINIMAL_ESTIMATE`] when no model applies.
    pub fn estimate(&self, op: &BlockOp) -> usize {
        match self.registry.estimate_op(op) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::debug!("{err}; assuming a negligible footprint for {op}");
                MINIMAL_ESTIMATE
            }
        }
    }

    /// Compute units to reserve for `op`.
    #[inline]
    pub fn tune(&self, op: &BlockOp) -> Reservation {
        self.profile.parallelism(self.estimate(op))
    }
}
