use std::sync::{Mutex, PoisonError};

use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

use super::{Runtime, Scheduler, SchedulerError, ScopeId};
use crate::loom::{block::BlockId, ops::BlockOp};

/// Remembers which blocks each scope produced, so they can be released together.
#[derive(Debug, Default)]
pub struct Lifecycle {
    scopes: Mutex<HashMap<ScopeId, HashSet<BlockId>>>,
}

impl Lifecycle {
    pub fn register(&self, scope: ScopeId, blocks: impl IntoIterator<Item = BlockId>) {
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        scopes.entry(scope).or_default().extend(blocks);
    }

    /// Blocks currently registered under `scope`.
    pub fn blocks(&self, scope: ScopeId) -> Vec<BlockId> {
        let scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        let mut blocks: Vec<_> = scopes
            .get(&scope)
            .map(|blocks| blocks.iter().copied().collect())
            .unwrap_or_default();
        blocks.sort_unstable();
        blocks
    }

    /// Forgets `scope`, returning the blocks it held.
    pub fn release(&self, scope: ScopeId) -> HashSet<BlockId> {
        let mut scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        scopes.remove(&scope).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.scopes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An open scheduler group. Every op submitted through it is registered under its id,
/// and the group is closed when the guard drops, on every exit path.
#[derive(Debug)]
pub struct Scope<'a, S: Scheduler> {
    runtime: &'a Runtime<S>,
    id: ScopeId,
}

impl<'a, S: Scheduler> Scope<'a, S> {
    pub(super) fn new(runtime: &'a Runtime<S>, id: ScopeId) -> Self {
        runtime.scheduler().open_group(id);
        Self { runtime, id }
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    #[inline]
    pub fn submit(&self, op: BlockOp) -> Result<(), SchedulerError> {
        self.runtime.submit(self.id, op)
    }
}

impl<S: Scheduler> Drop for Scope<'_, S> {
    fn drop(&mut self) {
        self.runtime.scheduler().close_group(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::Lifecycle;
    use crate::{loom::block::BlockId, runtime::ScopeId};

    #[test]
    fn test_register_release() {
        let lifecycle = Lifecycle::default();
        lifecycle.register(ScopeId(0), [BlockId(2), BlockId(1)]);
        lifecycle.register(ScopeId(0), [BlockId(1)]);
        lifecycle.register(ScopeId(1), [BlockId(3)]);

        assert_eq!(lifecycle.blocks(ScopeId(0)), vec![BlockId(1), BlockId(2)]);
        assert_eq!(lifecycle.len(), 2);

        let released = lifecycle.release(ScopeId(0));
        assert_eq!(released.len(), 2);
        assert!(lifecycle.blocks(ScopeId(0)).is_empty());
        assert!(lifecycle.release(ScopeId(0)).is_empty());
        assert_eq!(lifecycle.blocks(ScopeId(1)), vec![BlockId(3)]);
    }
}
