use std::sync::Arc;

use futures::{
    FutureExt,
    future::{Shared, try_join_all},
};
use rustc_hash::FxHashMap as HashMap;
use tokio::sync::Semaphore;

use super::{Scheduler, SchedulerError, ScopeId};
use crate::{
    hal::{Kernel, KernelError, cpu},
    loom::{
        block::{Block, BlockId},
        ops::{OpKind, Task},
        platform::{self, BoxFuture},
    },
    tuning::ClusterProfile,
};

type TaskFuture = Shared<BoxFuture<'static, Result<Vec<Arc<Block>>, SchedulerError>>>;
type BlockFuture = Shared<BoxFuture<'static, Result<Arc<Block>, SchedulerError>>>;
/// Completion of one task, without its outputs.
type DoneFuture = Shared<BoxFuture<'static, Result<(), SchedulerError>>>;

enum SchedulerEvent {
    Submit(Task),
    Resolve {
        id: BlockId,
        sender: flume::Sender<Option<BlockFuture>>,
    },
    Delete(BlockId),
    OpenGroup(ScopeId),
    CloseGroup(ScopeId),
    DeleteGroup(ScopeId),
    Barrier {
        scope: ScopeId,
        sender: flume::Sender<Vec<DoneFuture>>,
    },
}

#[derive(Debug, Clone)]
struct Backend {
    /// Kernels the scheduler is able to execute.
    kernels: Arc<HashMap<OpKind, Kernel>>,
    /// One permit per core of the node.
    cores: Arc<Semaphore>,
    total_cores: usize,
}

impl Backend {
    /// Builds the future of one task. Nothing runs until it is polled.
    fn execute(
        &self,
        task: Task,
        inputs: Result<Vec<BlockFuture>, SchedulerError>,
    ) -> TaskFuture {
        let Task { variant, op, .. } = task;
        let kernel = self.kernels.get(&op.kind()).copied();
        let cores = self.cores.clone();
        let permits = variant.reservation.0.clamp(1, self.total_cores) as u32;

        let future = async move {
            let kernel = kernel.ok_or_else(|| {
                log::error!("unable to execute op of kind {}", op.kind());
                SchedulerError::Kernel(op.kind())
            })?;
            let inputs = try_join_all(inputs?).await?;
            let _permit = cores
                .acquire_many_owned(permits)
                .await
                .map_err(|_| SchedulerError::Disconnected)?;

            let name = op.to_string();
            let expected = op.outputs().len();
            let outputs = match platform::handle(move || kernel(&op, &inputs)).await {
                Some(Ok(outputs)) if outputs.len() == expected => outputs,
                Some(Ok(outputs)) => {
                    let reason = KernelError::Arity(expected, outputs.len());
                    return Err(SchedulerError::Task { op: name, reason });
                }
                Some(Err(reason)) => {
                    log::error!("task {name} failed: {reason}");
                    return Err(SchedulerError::Task { op: name, reason });
                }
                None => {
                    log::error!("task {name} panicked");
                    return Err(SchedulerError::Panic(name));
                }
            };
            Ok(outputs.into_iter().map(Arc::new).collect())
        };
        future.boxed().shared()
    }
}

/// An in-process scheduler running block tasks on the blocking thread pool.
///
/// Every block id maps to the future of its latest version. A task captures the versions of
/// its inputs at submission, so tasks touching the same block run in submission order while
/// independent ones run concurrently, as far as their reservations fit into the node.
#[derive(Debug, Clone)]
pub struct Local {
    /// Sends events to the serve loop.
    sender: flume::Sender<SchedulerEvent>,
    profile: ClusterProfile,
}

impl Local {
    #[inline]
    pub fn profile(&self) -> ClusterProfile {
        self.profile
    }

    fn send(&self, event: SchedulerEvent) -> Result<(), SchedulerError> {
        self.sender.send(event).map_err(SchedulerError::from)
    }
}

impl Scheduler for Local {
    fn submit(&self, task: Task) -> Result<(), SchedulerError> {
        self.send(SchedulerEvent::Submit(task))
    }

    async fn resolve(&self, id: BlockId, exclusive: bool) -> Result<Arc<Block>, SchedulerError> {
        let (sender, receiver) = flume::bounded(0);
        self.send(SchedulerEvent::Resolve { id, sender })?;
        let future = receiver
            .recv_async()
            .await?
            .ok_or(SchedulerError::Block(id))?;
        let block = future.await?;
        match exclusive {
            true => Ok(Arc::new(Block::clone(&block))),
            false => Ok(block),
        }
    }

    fn delete(&self, id: BlockId) {
        if self.send(SchedulerEvent::Delete(id)).is_err() {
            log::warn!("unable to delete {id}: scheduler is gone");
        }
    }

    fn open_group(&self, scope: ScopeId) {
        if self.send(SchedulerEvent::OpenGroup(scope)).is_err() {
            log::warn!("unable to open {scope}: scheduler is gone");
        }
    }

    fn close_group(&self, scope: ScopeId) {
        if self.send(SchedulerEvent::CloseGroup(scope)).is_err() {
            log::warn!("unable to close {scope}: scheduler is gone");
        }
    }

    fn delete_group(&self, scope: ScopeId) {
        if self.send(SchedulerEvent::DeleteGroup(scope)).is_err() {
            log::warn!("unable to delete {scope}: scheduler is gone");
        }
    }

    async fn barrier(&self, scope: ScopeId) -> Result<(), SchedulerError> {
        let (sender, receiver) = flume::bounded(0);
        self.send(SchedulerEvent::Barrier { scope, sender })?;
        let tasks = receiver.recv_async().await?;
        try_join_all(tasks).await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LocalBuilder {
    pub kernels: HashMap<OpKind, Kernel>,
    pub profile: ClusterProfile,
}

impl Default for LocalBuilder {
    /// A builder without any kernel.
    fn default() -> Self {
        Self {
            kernels: HashMap::default(),
            profile: ClusterProfile::default(),
        }
    }
}

impl LocalBuilder {
    /// A builder with every reference CPU kernel registered.
    pub fn new() -> Self {
        cpu::kernels()
            .into_iter()
            .fold(Self::default(), |builder, (kind, kernel)| {
                builder.add_kernel(kind, kernel)
            })
    }

    pub fn add_kernel(mut self, kind: OpKind, kernel: Kernel) -> Self {
        self.kernels.insert(kind, kernel);
        self
    }

    pub fn profile(mut self, profile: ClusterProfile) -> Self {
        self.profile = profile;
        self
    }

    pub async fn build(self) -> Local {
        let profile = self.profile;
        let total_cores = profile.total_cores.max(1);
        let backend = Backend {
            kernels: Arc::new(self.kernels),
            cores: Arc::new(Semaphore::new(total_cores)),
            total_cores,
        };

        let (sender, receiver) = flume::unbounded();
        platform::spawn(serve(backend, receiver));

        Local { sender, profile }
    }
}

async fn serve(backend: Backend, receiver: flume::Receiver<SchedulerEvent>) {
    let mut blocks: HashMap<BlockId, BlockFuture> = HashMap::default();
    let mut groups: HashMap<ScopeId, Vec<DoneFuture>> = HashMap::default();

    while let Ok(event) = receiver.recv_async().await {
        match event {
            SchedulerEvent::Submit(task) => {
                let scope = task.scope;
                let outputs = task.op.outputs();
                let inputs = task
                    .op
                    .inputs()
                    .into_iter()
                    .map(|id| blocks.get(&id).cloned().ok_or(SchedulerError::Block(id)))
                    .collect::<Result<Vec<_>, _>>();

                let future = backend.execute(task, inputs);
                // groups only see completion, so finished outputs live as long as their blocks
                let done = future
                    .clone()
                    .map(|outputs| outputs.map(drop))
                    .boxed()
                    .shared();
                platform::spawn(done.clone());

                for (index, ir) in outputs.into_iter().enumerate() {
                    let id = ir.id;
                    let block = future
                        .clone()
                        .map(move |outputs| {
                            outputs?
                                .get(index)
                                .cloned()
                                .ok_or(SchedulerError::Block(id))
                        })
                        .boxed()
                        .shared();
                    blocks.insert(id, block);
                }
                groups.entry(scope).or_default().push(done);
            }
            SchedulerEvent::Resolve { id, sender } => {
                let block = blocks.get(&id).cloned();
                _ = sender.send_async(block).await
            }
            SchedulerEvent::Delete(id) => {
                if blocks.remove(&id).is_none() {
                    log::debug!("delete unknown {id}");
                }
            }
            SchedulerEvent::OpenGroup(scope) => {
                groups.entry(scope).or_default();
            }
            SchedulerEvent::CloseGroup(scope) => prune(&mut groups, scope),
            SchedulerEvent::DeleteGroup(scope) => {
                groups.remove(&scope);
            }
            SchedulerEvent::Barrier { scope, sender } => {
                prune(&mut groups, scope);
                let tasks = groups.get(&scope).cloned().unwrap_or_default();
                _ = sender.send_async(tasks).await
            }
        }
    }
}

/// Forgets tasks of `scope` that finished successfully.
///
/// Pending and failed tasks stay, so a later barrier still observes them.
fn prune(groups: &mut HashMap<ScopeId, Vec<DoneFuture>>, scope: ScopeId) {
    if let Some(tasks) = groups.get_mut(&scope) {
        tasks.retain(|task| !matches!(task.peek(), Some(Ok(()))));
        if tasks.is_empty() {
            groups.remove(&scope);
        }
    }
}
