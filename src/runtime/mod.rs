//! The boundary between tensors and whatever executes their block tasks.
//!
//! A [`Scheduler`] accepts [`Task`]s, tracks the blocks they produce and hands materialized
//! blocks back on request. The [`Runtime`] sits in front of it: it tunes every op before
//! dispatch, hands out ids, and remembers which blocks each lifecycle scope produced.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    hal::KernelError,
    loom::{
        block::{Block, BlockId},
        ops::{BlockOp, OpKind, Task},
    },
    tuning::{Autotuner, ClusterProfile, CostRegistry, VariantRegistry},
};

pub use lifecycle::{Lifecycle, Scope};
pub use local::{Local, LocalBuilder};

pub mod lifecycle;
pub mod local;

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into,
    Serialize, Deserialize,
)]
#[display("scope#{_0}")]
pub struct ScopeId(pub usize);

#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("scheduler is disconnected")]
    Disconnected,
    #[error("{0} is unknown or has been deleted")]
    Block(BlockId),
    #[error("task {op} failed: {reason}")]
    Task { op: String, reason: KernelError },
    #[error("task {0} panicked")]
    Panic(String),
    #[error("no kernel registered for {0}")]
    Kernel(OpKind),
}

impl<T> From<flume::SendError<T>> for SchedulerError {
    fn from(_: flume::SendError<T>) -> Self {
        Self::Disconnected
    }
}

impl From<flume::RecvError> for SchedulerError {
    fn from(_: flume::RecvError) -> Self {
        Self::Disconnected
    }
}

/// Executes block tasks somewhere, possibly far away.
///
/// Submission never blocks: outputs of a task are pending until it completes, and a failed
/// task surfaces as an error from every [`Scheduler::resolve`] or [`Scheduler::barrier`]
/// that depends on it.
#[trait_variant::make(Scheduler: Send)]
pub trait LocalScheduler: Sync {
    /// Hands a task over for execution. Its inputs are the versions current at submission.
    fn submit(&self, task: Task) -> Result<(), SchedulerError>;
    /// Waits for the current version of a block.
    ///
    /// With `exclusive`, the returned block is a private copy the caller may mutate.
    async fn resolve(&self, id: BlockId, exclusive: bool) -> Result<Arc<Block>, SchedulerError>;
    /// Forgets a block. Tasks already reading or writing it still run to completion.
    fn delete(&self, id: BlockId);
    fn open_group(&self, scope: ScopeId);
    fn close_group(&self, scope: ScopeId);
    /// Forgets the tasks of `scope`. Later barriers on it return immediately.
    fn delete_group(&self, scope: ScopeId);
    /// Waits for every task submitted under `scope`.
    async fn barrier(&self, scope: ScopeId) -> Result<(), SchedulerError>;
}

/// Hands out ids for scopes and blocks. Owned by one [`Runtime`].
#[derive(Debug, Default)]
pub struct Sequence(AtomicUsize);

impl Sequence {
    #[inline]
    pub fn next(&self) -> usize {
        self.0.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn scope(&self) -> ScopeId {
        ScopeId(self.next())
    }

    #[inline]
    pub fn block(&self) -> BlockId {
        BlockId(self.next())
    }
}

#[derive(Debug)]
pub struct Runtime<S> {
    scheduler: S,
    tuner: Autotuner,
    variants: VariantRegistry,
    sequence: Sequence,
    lifecycle: Lifecycle,
    rng: Mutex<fastrand::Rng>,
}

impl<S: Scheduler> Runtime<S> {
    pub fn new(scheduler: S, profile: ClusterProfile) -> Self {
        Self::with_registry(scheduler, profile, CostRegistry::default())
    }

    pub fn with_registry(scheduler: S, profile: ClusterProfile, registry: CostRegistry) -> Self {
        Self {
            scheduler,
            tuner: Autotuner::new(profile, registry),
            variants: Default::default(),
            sequence: Default::default(),
            lifecycle: Default::default(),
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Makes random fills reproducible.
    pub fn with_seed(self, seed: u64) -> Self {
        let rng = Mutex::new(fastrand::Rng::with_seed(seed));
        Self { rng, ..self }
    }

    #[inline]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    #[inline]
    pub fn tuner(&self) -> &Autotuner {
        &self.tuner
    }

    #[inline]
    pub fn variants(&self) -> &VariantRegistry {
        &self.variants
    }

    #[inline]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    #[inline]
    pub fn scope_id(&self) -> ScopeId {
        self.sequence.scope()
    }

    #[inline]
    pub fn block_id(&self) -> BlockId {
        self.sequence.block()
    }

    /// Draws a seed for one random block.
    pub fn seed(&self) -> u64 {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).u64(..)
    }

    /// Opens a lifecycle scope. The group closes when the returned guard drops.
    pub fn open(&self, id: ScopeId) -> Scope<'_, S> {
        Scope::new(self, id)
    }

    /// Tunes `op`, dispatches it and registers its outputs under `scope`.
    #[cfg_attr(feature = "trace", tracing::instrument(skip_all))]
    pub fn submit(&self, scope: ScopeId, op: BlockOp) -> Result<(), SchedulerError> {
        let reservation = self.tuner.tune(&op);
        let variant = self.variants.get(op.kind(), reservation);
        let outputs: Vec<_> = op.outputs().into_iter().map(|ir| ir.id).collect();
        log::debug!("submit {op} as {variant} under {scope}");

        self.scheduler.submit(Task { scope, variant, op })?;
        self.lifecycle.register(scope, outputs);
        Ok(())
    }

    #[inline]
    pub async fn sync(&self, scope: ScopeId) -> Result<(), SchedulerError> {
        self.scheduler.barrier(scope).await
    }

    #[inline]
    pub async fn resolve(&self, id: BlockId) -> Result<Arc<Block>, SchedulerError> {
        self.scheduler.resolve(id, false).await
    }

    /// Deletes every block registered under `scope`, along with `blocks`.
    pub fn release(&self, scope: ScopeId, blocks: impl IntoIterator<Item = BlockId>) {
        let mut ids = self.lifecycle.release(scope);
        ids.extend(blocks);
        log::debug!("release {scope}: {} blocks", ids.len());
        for id in ids {
            self.scheduler.delete(id);
        }
        self.scheduler.delete_group(scope);
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, error::Error, sync::Arc};

    use super::{LocalBuilder, Runtime, Scheduler, SchedulerError, Sequence};
    use crate::{
        loom::{
            block::BlockId,
            num::DataType,
            ops::{Access, BlockIr, BlockOp, OpKind},
        },
        tuning::{ClusterProfile, Reservation},
    };

    fn full(id: BlockId, value: f64) -> BlockOp {
        BlockOp::Full {
            output: BlockIr {
                shape: [4, 4].into(),
                r#type: DataType::F64,
                id,
                access: Access::WriteOnly,
            },
            value: Arc::from(value.to_ne_bytes()),
        }
    }

    #[test]
    fn test_sequence() {
        let sequence = Sequence::default();
        let ids: HashSet<_> = (0..100).map(|_| sequence.next()).collect();
        assert_eq!(ids.len(), 100);
        assert_ne!(sequence.scope().0, sequence.block().0);
    }

    #[tokio::test]
    async fn test_submit_release() -> Result<(), Box<dyn Error>> {
        let profile = ClusterProfile::new(4, 1024);
        let local = LocalBuilder::new().profile(profile).build().await;
        let runtime = Runtime::new(local, profile);

        let scope = runtime.scope_id();
        let ids = [runtime.block_id(), runtime.block_id()];
        {
            let scope = runtime.open(scope);
            scope.submit(full(ids[0], 1.0))?;
            scope.submit(full(ids[1], 2.0))?;
        }
        runtime.sync(scope).await?;
        assert_eq!(runtime.lifecycle().blocks(scope).len(), 2);
        // 4 × 4 f64 is 128 bytes, well within one 1 KiB core
        assert_eq!(runtime.variants().len(), 1);
        let variant = runtime.variants().get(OpKind::Full, Reservation(1));
        assert_eq!(variant.to_string(), "full[1]");
        assert_eq!(runtime.variants().len(), 1);

        let block = runtime.resolve(ids[1]).await?;
        assert_eq!(block.read::<f64>(&[3, 3]), Some(2.0));

        runtime.release(scope, Vec::<BlockId>::new());
        assert!(runtime.lifecycle().blocks(scope).is_empty());
        for id in ids {
            let result = runtime.scheduler().resolve(id, false).await;
            assert!(matches!(result, Err(SchedulerError::Block(x)) if x == id));
        }
        Ok(())
    }
}
