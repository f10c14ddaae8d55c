use std::sync::Arc;

use futures::future::try_join_all;
use itertools::Itertools;
use thiserror::Error;

use super::{
    block::{Block, BlockHandle},
    grid::Grid,
    num::{DataType, Float, Scalar},
    ops::{Access, BlockIr, BlockOp},
    shape::{Shape, is_permutation},
    slice::Slice,
};
use crate::{
    hal::KernelError,
    runtime::{Runtime, Scheduler, SchedulerError, ScopeId},
};

#[derive(Debug, Error)]
pub enum TensorError {
    #[error("tensor shape error: {0} is incompatible with {1}")]
    InvalidShape(Shape, Shape),
    #[error("tensor axes error: {0:?} must be distinct and in range")]
    InvalidAxes(Vec<usize>),
    #[error("tensor blocking error: block shapes {0} and {1} differ along contracted axes")]
    IncompatibleBlocking(Shape, Shape),
    #[error("tensor error: {0} is not implemented")]
    NotImplemented(&'static str),
    #[error("tensor index error: {0} is out of range for {1}")]
    Index(Slice, Shape),
    #[error("tensor type error: data type {0} mismatches {1}")]
    Type(DataType, DataType),
    #[error("tensor variant error: cannot mix dense and blocked operands")]
    Variant,
    #[error("tensor runtime error: operands live on different runtimes")]
    Runtime,
    #[error("tensor equation error: {0}")]
    Equation(String),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// A tensor split into equally shaped blocks, each living on the scheduler.
///
/// The tensor owns the handles of its grid. If it also owns the blocks behind them, dropping
/// it deletes every block it holds along with everything registered under its scope.
#[derive(Debug)]
pub struct Tensor<S: Scheduler> {
    runtime: Arc<Runtime<S>>,
    shape: Shape,
    block_shape: Shape,
    blocks: Grid<BlockHandle>,
    r#type: DataType,
    id: ScopeId,
    owns_blocks: bool,
}

impl<S: Scheduler> Drop for Tensor<S> {
    fn drop(&mut self) {
        if self.owns_blocks {
            self.runtime
                .release(self.id, self.blocks.iter().map(BlockHandle::id));
        }
    }
}

/// Returns the grid of `shape` split by `block_shape`, if every extent is positive and divisible.
pub(crate) fn grid_shape(shape: &Shape, block_shape: &Shape) -> Result<Shape, TensorError> {
    let error = || TensorError::InvalidShape(shape.clone(), block_shape.clone());
    if shape.iter().any(|&extent| extent == 0) {
        return Err(error());
    }
    shape.div_exact(block_shape).ok_or_else(error)
}

impl<S: Scheduler> Tensor<S> {
    /// Wraps an existing grid of handles, checking it against `shape` and `block_shape`.
    ///
    /// The tensor inherits the scope `id` if given, and draws a fresh one otherwise.
    pub fn from_grid(
        runtime: Arc<Runtime<S>>,
        blocks: Grid<BlockHandle>,
        shape: impl Into<Shape>,
        block_shape: impl Into<Shape>,
        owns_blocks: bool,
        id: Option<ScopeId>,
    ) -> Result<Self, TensorError> {
        let shape = shape.into();
        let block_shape = block_shape.into();
        let grid = grid_shape(&shape, &block_shape)?;
        if blocks.shape() != &grid {
            return Err(TensorError::InvalidShape(blocks.shape().clone(), grid));
        }
        if let Some(handle) = blocks.iter().find(|handle| handle.shape() != &block_shape) {
            return Err(TensorError::InvalidShape(handle.shape().clone(), block_shape));
        }
        let Some(r#type) = blocks.iter().next().map(BlockHandle::data_type) else {
            return Err(TensorError::InvalidShape(grid, block_shape));
        };
        if let Some(handle) = blocks.iter().find(|handle| handle.data_type() != r#type) {
            return Err(TensorError::Type(handle.data_type(), r#type));
        }

        let id = id.unwrap_or_else(|| runtime.scope_id());
        Ok(Self {
            runtime,
            shape,
            block_shape,
            blocks,
            r#type,
            id,
            owns_blocks,
        })
    }

    /// Assembles an owning tensor from parts already known to be consistent.
    pub(crate) fn from_parts(
        runtime: Arc<Runtime<S>>,
        shape: Shape,
        block_shape: Shape,
        blocks: Grid<BlockHandle>,
        r#type: DataType,
        id: ScopeId,
    ) -> Self {
        Self {
            runtime,
            shape,
            block_shape,
            blocks,
            r#type,
            id,
            owns_blocks: true,
        }
    }

    /// Opens a fresh scope and submits one op per grid cell.
    fn create(
        runtime: Arc<Runtime<S>>,
        shape: Shape,
        block_shape: Shape,
        r#type: DataType,
        op: impl Fn(BlockIr, &[usize]) -> BlockOp,
    ) -> Result<Self, TensorError> {
        let grid = grid_shape(&shape, &block_shape)?;
        let id = runtime.scope_id();

        let blocks = {
            let scope = runtime.open(id);
            Grid::from_fn(grid, |coord| {
                let handle = BlockHandle::new(runtime.block_id(), block_shape.clone(), r#type);
                scope.submit(op(handle.ir(Access::WriteOnly), coord))?;
                Ok::<_, SchedulerError>(handle)
            })
        };
        let blocks = match blocks {
            Ok(blocks) => blocks,
            Err(err) => {
                runtime.release(id, None);
                return Err(err.into());
            }
        };
        Ok(Self::from_parts(runtime, shape, block_shape, blocks, r#type, id))
    }

    /// Creates a tensor with every element set to `value`.
    pub fn full<T: Scalar>(
        runtime: Arc<Runtime<S>>,
        value: T,
        shape: impl Into<Shape>,
        block_shape: impl Into<Shape>,
    ) -> Result<Self, TensorError> {
        let value: Arc<[u8]> = bytemuck::bytes_of(&value).into();
        let op = |output, _: &[usize]| BlockOp::Full {
            output,
            value: value.clone(),
        };
        Self::create(runtime, shape.into(), block_shape.into(), T::DATA_TYPE, op)
    }

    #[inline]
    pub fn zeros<T: Scalar>(
        runtime: Arc<Runtime<S>>,
        shape: impl Into<Shape>,
        block_shape: impl Into<Shape>,
    ) -> Result<Self, TensorError> {
        Self::full(runtime, T::zero(), shape, block_shape)
    }

    #[inline]
    pub fn ones<T: Scalar>(
        runtime: Arc<Runtime<S>>,
        shape: impl Into<Shape>,
        block_shape: impl Into<Shape>,
    ) -> Result<Self, TensorError> {
        Self::full(runtime, T::one(), shape, block_shape)
    }

    /// Creates a tensor of uniform samples in `[0, 1)`. Every block draws its own seed.
    pub fn rand<T: Float>(
        runtime: Arc<Runtime<S>>,
        shape: impl Into<Shape>,
        block_shape: impl Into<Shape>,
    ) -> Result<Self, TensorError> {
        let seeds = runtime.clone();
        let op = move |output, _: &[usize]| BlockOp::Rand {
            output,
            seed: seeds.seed(),
        };
        Self::create(runtime, shape.into(), block_shape.into(), T::DATA_TYPE, op)
    }

    /// Creates an `n × n` identity.
    pub fn eye<T: Scalar>(
        runtime: Arc<Runtime<S>>,
        n: usize,
        block_shape: [usize; 2],
    ) -> Result<Self, TensorError> {
        let op = |output, coord: &[usize]| BlockOp::Eye {
            output,
            n,
            coord: [coord[0], coord[1]],
        };
        Self::create(runtime, [n, n].into(), block_shape.into(), T::DATA_TYPE, op)
    }

    #[inline]
    pub fn runtime(&self) -> &Arc<Runtime<S>> {
        &self.runtime
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn block_shape(&self) -> &Shape {
        &self.block_shape
    }

    /// Number of blocks along each axis.
    #[inline]
    pub fn grid(&self) -> &Shape {
        self.blocks.shape()
    }

    #[inline]
    pub fn blocks(&self) -> &Grid<BlockHandle> {
        &self.blocks
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn volume(&self) -> usize {
        self.shape.size()
    }

    #[inline]
    pub fn block_volume(&self) -> usize {
        self.block_shape.size()
    }

    #[inline]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.r#type
    }

    #[inline]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    #[inline]
    pub fn owns_blocks(&self) -> bool {
        self.owns_blocks
    }

    /// Handles of the blocks selected by `slice`, in row-major order of the selection.
    pub fn select(&self, slice: impl Into<Slice>) -> Result<Vec<&BlockHandle>, TensorError> {
        let slice = slice.into();
        self.blocks
            .select(&slice)
            .ok_or_else(|| TensorError::Index(slice, self.grid().clone()))
    }

    /// Splits a global index into the handle holding it and the index inside that block.
    fn locate(&self, index: &[usize]) -> Result<(&BlockHandle, Vec<usize>), TensorError> {
        let error = || TensorError::Index(Slice::point(index), self.shape.clone());
        if self.shape.offset(index).is_none() {
            return Err(error());
        }
        let (coord, local): (Vec<_>, Vec<_>) = index
            .iter()
            .zip_eq(self.block_shape.iter())
            .map(|(&i, &extent)| (i / extent, i % extent))
            .unzip();
        let handle = self.blocks.get(&coord).ok_or_else(error)?;
        Ok((handle, local))
    }

    /// Reads one element, waiting for the block holding it.
    pub async fn get<T: Scalar>(&self, index: &[usize]) -> Result<T, TensorError> {
        if T::DATA_TYPE != self.r#type {
            return Err(TensorError::Type(T::DATA_TYPE, self.r#type));
        }
        let (handle, local) = self.locate(index)?;
        let block = self.runtime.resolve(handle.id()).await?;
        block
            .read::<T>(&local)
            .ok_or_else(|| TensorError::Index(Slice::point(&local), block.shape().clone()))
    }

    /// Overwrites one element. The write is a task like any other.
    pub fn set<T: Scalar>(&mut self, index: &[usize], value: T) -> Result<(), TensorError> {
        if T::DATA_TYPE != self.r#type {
            return Err(TensorError::Type(T::DATA_TYPE, self.r#type));
        }
        let (handle, local) = self.locate(index)?;
        let op = BlockOp::SetValue {
            block: handle.ir(Access::ReadWrite),
            index: local.into(),
            value: bytemuck::bytes_of(&value).into(),
        };
        self.runtime.open(self.id).submit(op)?;
        Ok(())
    }

    /// Permutes the axes in place: the grid, both shapes, and every block.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    pub fn transpose(&mut self, axes: &[usize]) -> Result<(), TensorError> {
        if !is_permutation(axes, self.rank()) {
            return Err(TensorError::InvalidAxes(axes.to_vec()));
        }

        let permutation: Arc<[usize]> = axes.into();
        {
            let scope = self.runtime.open(self.id);
            for handle in self.blocks.iter() {
                scope.submit(BlockOp::Transpose {
                    block: handle.ir(Access::ReadWrite),
                    axes: permutation.clone(),
                })?;
            }
        }

        self.blocks.iter_mut().for_each(|handle| handle.permute(axes));
        self.blocks.permute(axes);
        self.shape = self.shape.permute(axes);
        self.block_shape = self.block_shape.permute(axes);
        Ok(())
    }

    /// Repartitioning into another block shape is not supported.
    pub fn rechunk(&mut self, _block_shape: impl Into<Shape>) -> Result<(), TensorError> {
        Err(TensorError::NotImplemented("rechunk"))
    }

    /// Waits for every task submitted under the tensor's scope.
    #[inline]
    pub async fn sync(&self) -> Result<(), TensorError> {
        self.runtime.sync(self.id).await?;
        Ok(())
    }

    /// Counts the nonzero elements, one task per block.
    pub async fn count_nonzero(&self) -> Result<usize, TensorError> {
        let id = self.runtime.scope_id();
        let counts = {
            let scope = self.runtime.open(id);
            self.blocks
                .iter()
                .map(|handle| {
                    let id = self.runtime.block_id();
                    let output = BlockHandle::new(id, Shape::default(), DataType::I64);
                    scope.submit(BlockOp::CountNonzero {
                        input: handle.ir(Access::ReadOnly),
                        output: output.ir(Access::WriteOnly),
                    })?;
                    Ok::<_, SchedulerError>(output)
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let total = async {
            let counts = try_join_all(
                counts?
                    .iter()
                    .map(|handle| self.runtime.resolve(handle.id())),
            )
            .await?;
            let total: i64 = counts.iter().filter_map(|block| block.read::<i64>(&[])).sum();
            Ok::<_, SchedulerError>(total as usize)
        }
        .await;
        self.runtime.release(id, None);
        Ok(total?)
    }

    /// Resolves every block and assembles the whole tensor in memory.
    pub async fn gather(&self) -> Result<Block, TensorError> {
        let blocks = try_join_all(
            self.blocks
                .iter()
                .map(|handle| self.runtime.resolve(handle.id())),
        )
        .await?;
        if let Some(block) = blocks.iter().find(|block| block.shape() != &self.block_shape) {
            return Err(TensorError::InvalidShape(
                block.shape().clone(),
                self.block_shape.clone(),
            ));
        }

        let size = self.r#type.size();
        let mut data = Vec::with_capacity(self.volume() * size);
        for index in self.shape.indices() {
            let (coord, local): (Vec<_>, Vec<_>) = index
                .iter()
                .zip_eq(self.block_shape.iter())
                .map(|(&i, &extent)| (i / extent, i % extent))
                .unzip();
            let cell = self.grid().offset(&coord);
            let offset = self.block_shape.offset(&local);
            let (Some(cell), Some(offset)) = (cell, offset) else {
                return Err(TensorError::Index(Slice::point(&index), self.shape.clone()));
            };
            let start = offset * size;
            data.extend_from_slice(&blocks[cell].bytes()[start..start + size]);
        }

        let len = data.len();
        Block::from_bytes(self.shape.clone(), self.r#type, data.into())
            .ok_or(TensorError::Kernel(KernelError::Value(len, self.r#type)))
    }
}

impl<S: Scheduler> std::fmt::Display for Tensor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tensor<{}; {}; {}>({})",
            self.r#type, self.shape, self.block_shape, self.id
        )
    }
}

/// Permutes the axes of `tensor` in place and hands it back.
pub fn transpose<S: Scheduler>(
    mut tensor: Tensor<S>,
    axes: &[usize],
) -> Result<Tensor<S>, TensorError> {
    tensor.transpose(axes)?;
    Ok(tensor)
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use super::{Tensor, TensorError};
    use crate::{
        loom::{
            block::{BlockHandle, BlockId},
            grid::Grid,
            num::DataType,
            ops::{Access, BlockOp},
            shape::Shape,
        },
        runtime::{Local, LocalBuilder, Runtime, Scheduler, SchedulerError},
        tuning::ClusterProfile,
    };

    async fn runtime() -> Arc<Runtime<Local>> {
        let profile = ClusterProfile::new(4, 1 << 20);
        let local = LocalBuilder::new().profile(profile).build().await;
        Arc::new(Runtime::new(local, profile).with_seed(42))
    }

    #[tokio::test]
    async fn test_factories() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;

        let tensor = Tensor::zeros::<f64>(runtime.clone(), [4, 6, 2], [2, 3, 1])?;
        assert_eq!(tensor.grid(), &Shape::from([2, 2, 2]));
        assert_eq!(tensor.rank(), 3);
        assert_eq!(tensor.volume(), 48);
        assert_eq!(tensor.block_volume(), 6);
        assert_eq!(tensor.block_count(), 8);
        assert!(tensor.owns_blocks());
        tensor.sync().await?;
        assert_eq!(tensor.get::<f64>(&[3, 5, 1]).await?, 0.0);

        let tensor = Tensor::full(runtime.clone(), 7i32, [4], [2])?;
        assert_eq!(tensor.data_type(), DataType::I32);
        assert_eq!(tensor.gather().await?.to_vec::<i32>(), Some(vec![7; 4]));

        let tensor = Tensor::rand::<f32>(runtime.clone(), [4, 4], [2, 2])?;
        let values = tensor.gather().await?.to_vec::<f32>().unwrap_or_default();
        assert_eq!(values.len(), 16);
        assert!(values.iter().all(|x| (0.0..1.0).contains(x)));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_shape() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        for (shape, block_shape) in [
            (vec![5, 4], vec![2, 2]),
            (vec![4, 4], vec![4, 3]),
            (vec![4, 4], vec![2]),
            (vec![4, 0], vec![2, 1]),
        ] {
            let result = Tensor::ones::<f64>(runtime.clone(), shape, block_shape);
            assert!(matches!(result, Err(TensorError::InvalidShape(..))));
        }
        assert!(runtime.lifecycle().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_from_grid() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let handle = |id| BlockHandle::new(BlockId(id), Shape::from([2, 2]), DataType::F32);

        let blocks = Grid::from_fn([2, 1], |coord| Ok::<_, TensorError>(handle(coord[0])))?;
        let result = Tensor::from_grid(runtime.clone(), blocks, [4, 4], [2, 2], true, None);
        assert!(matches!(result, Err(TensorError::InvalidShape(..))));

        let blocks = Grid::from_fn([2, 2], |coord| Ok::<_, TensorError>(handle(coord[0])))?;
        let tensor = Tensor::from_grid(runtime.clone(), blocks, [4, 4], [2, 2], false, None)?;
        assert_eq!(tensor.grid(), &Shape::from([2, 2]));
        assert!(!tensor.owns_blocks());
        Ok(())
    }

    #[tokio::test]
    async fn test_transpose() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let mut tensor = Tensor::zeros::<f64>(runtime.clone(), [4, 6, 2], [2, 3, 1])?;
        tensor.set(&[1, 4, 0], 3.0)?;
        tensor.set(&[3, 0, 1], 5.0)?;
        let before = tensor.gather().await?;

        tensor.transpose(&[2, 0, 1])?;
        assert_eq!(tensor.shape(), &Shape::from([2, 4, 6]));
        assert_eq!(tensor.block_shape(), &Shape::from([1, 2, 3]));
        assert_eq!(tensor.grid(), &Shape::from([2, 2, 2]));
        assert_eq!(tensor.get::<f64>(&[0, 1, 4]).await?, 3.0);
        assert_eq!(tensor.get::<f64>(&[1, 3, 0]).await?, 5.0);

        tensor.transpose(&[1, 2, 0])?;
        assert_eq!(tensor.shape(), &Shape::from([4, 6, 2]));
        assert_eq!(tensor.block_shape(), &Shape::from([2, 3, 1]));
        assert_eq!(tensor.gather().await?, before);

        for axes in [vec![0, 0, 1], vec![0, 1], vec![0, 1, 3]] {
            let result = tensor.transpose(&axes);
            assert!(matches!(result, Err(TensorError::InvalidAxes(_))));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_get_set() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let mut tensor = Tensor::ones::<i64>(runtime.clone(), [4, 4], [2, 2])?;
        tensor.set(&[2, 3], 9i64)?;
        assert_eq!(tensor.get::<i64>(&[2, 3]).await?, 9);
        assert_eq!(tensor.get::<i64>(&[2, 2]).await?, 1);
        assert_eq!(tensor.get::<i64>(&[3, 3]).await?, 1);

        assert!(matches!(tensor.get::<f64>(&[0, 0]).await, Err(TensorError::Type(..))));
        assert!(matches!(tensor.get::<i64>(&[4, 0]).await, Err(TensorError::Index(..))));
        assert!(matches!(tensor.get::<i64>(&[0]).await, Err(TensorError::Index(..))));
        assert!(matches!(tensor.set(&[0, 0], 1.0f32), Err(TensorError::Type(..))));
        Ok(())
    }

    #[tokio::test]
    async fn test_eye() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let tensor = Tensor::eye::<f32>(runtime.clone(), 4, [2, 2])?;
        let block = tensor.gather().await?;
        for index in tensor.shape().indices() {
            let expected = if index[0] == index[1] { 1.0 } else { 0.0 };
            assert_eq!(block.read::<f32>(&index), Some(expected));
        }
        assert_eq!(tensor.count_nonzero().await?, 4);

        let tensor = Tensor::eye::<i32>(runtime.clone(), 6, [3, 2])?;
        assert_eq!(tensor.count_nonzero().await?, 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_select() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let tensor = Tensor::zeros::<f64>(runtime.clone(), [4, 6], [2, 2])?;
        let column = tensor.select((.., 1usize))?;
        assert_eq!(column.len(), 2);
        let expected = tensor.blocks().get(&[0, 1]).map(BlockHandle::id);
        assert_eq!(Some(column[0].id()), expected);

        assert_eq!(tensor.select((1usize, ..))?.len(), 3);
        assert!(matches!(tensor.select((2usize, ..)), Err(TensorError::Index(..))));
        assert!(matches!(tensor.select(..), Err(TensorError::Index(..))));
        Ok(())
    }

    #[tokio::test]
    async fn test_rechunk() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let mut tensor = Tensor::zeros::<f64>(runtime.clone(), [4, 4], [2, 2])?;
        for block_shape in [[1, 1], [2, 2], [4, 4]] {
            let result = tensor.rechunk(block_shape);
            assert!(matches!(result, Err(TensorError::NotImplemented(_))));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_release() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let mut tensor = Tensor::ones::<f64>(runtime.clone(), [4, 4], [2, 2])?;
        tensor.transpose(&[1, 0])?;
        tensor.sync().await?;
        let ids: Vec<_> = tensor.blocks().iter().map(BlockHandle::id).collect();
        let id = tensor.id();
        drop(tensor);

        assert!(runtime.lifecycle().blocks(id).is_empty());
        for id in ids {
            let result = runtime.scheduler().resolve(id, false).await;
            assert!(matches!(result, Err(SchedulerError::Block(x)) if x == id));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_release_frees_blocks() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let tensor = Tensor::ones::<f64>(runtime.clone(), [4, 4], [2, 2])?;
        tensor.sync().await?;
        let id = tensor
            .blocks()
            .iter()
            .next()
            .map(BlockHandle::id)
            .ok_or("empty grid")?;
        let block = runtime.resolve(id).await?;
        let scope = tensor.id();
        drop(tensor);

        // the barrier is answered only after every pending delete has been served
        runtime.sync(scope).await?;
        assert_eq!(Arc::strong_count(&block), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_borrowed_blocks() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let scope = runtime.scope_id();
        let blocks = Grid::from_fn([2], |_| {
            let handle = BlockHandle::new(runtime.block_id(), Shape::from([3]), DataType::F64);
            runtime.submit(
                scope,
                BlockOp::Full {
                    output: handle.ir(Access::WriteOnly),
                    value: Arc::from(2.0f64.to_ne_bytes()),
                },
            )?;
            Ok::<_, SchedulerError>(handle)
        })?;
        let ids: Vec<_> = blocks.iter().map(BlockHandle::id).collect();

        let tensor = Tensor::from_grid(runtime.clone(), blocks, [6], [3], false, Some(scope))?;
        assert_eq!(tensor.id(), scope);
        assert_eq!(tensor.get::<f64>(&[4]).await?, 2.0);
        drop(tensor);

        for id in ids {
            let block = runtime.resolve(id).await?;
            assert_eq!(block.read::<f64>(&[0]), Some(2.0));
        }
        runtime.release(scope, None);
        Ok(())
    }
}
