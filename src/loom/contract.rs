//! Block-level tensor contraction.
//!
//! Contracting two block-partitioned tensors decomposes into sums of pairwise block
//! contractions over the shared block index: the output block at grid coordinate `c` is
//! `Σ_k tensordot(a[c_a ⊕ k], b[c_b ⊕ k])`, where `k` runs over the grid extents of the
//! contracted axes. Each output block is one task.

use std::sync::Arc;

use itertools::Itertools;

use super::{
    block::BlockHandle,
    grid::Grid,
    ops::{Access, BlockIr, BlockOp},
    shape::{Shape, is_unique},
    slice::Slice,
    tensor::{Tensor, TensorError},
};
use crate::runtime::Scheduler;

/// Checks that `axes` names distinct axes of a rank-`rank` tensor.
fn check_axes(axes: &[usize], rank: usize) -> Result<(), TensorError> {
    match is_unique(axes) && axes.iter().all(|&axis| axis < rank) {
        true => Ok(()),
        false => Err(TensorError::InvalidAxes(axes.to_vec())),
    }
}

/// Rebuilds a full-rank grid coordinate from the outer coordinate and the contracted index `k`.
fn expand(outer: &[usize], axes: &[usize], k: &[usize]) -> Option<Vec<usize>> {
    let rank = outer.len() + axes.len();
    let mut outer = outer.iter().copied();
    (0..rank)
        .map(|axis| match axes.iter().position(|&x| x == axis) {
            Some(index) => k.get(index).copied(),
            None => outer.next(),
        })
        .collect()
}

/// Contracts `axes[0]` of `a` with `axes[1]` of `b`, pairwise.
///
/// The result has the outer axes of `a` followed by those of `b`, both in their original order,
/// and lives under a fresh scope.
#[cfg_attr(feature = "trace", tracing::instrument(skip(a, b)))]
pub fn tensordot<S: Scheduler>(
    a: &Tensor<S>,
    b: &Tensor<S>,
    axes: [&[usize]; 2],
) -> Result<Tensor<S>, TensorError> {
    let [axes_a, axes_b] = axes;
    if !Arc::ptr_eq(a.runtime(), b.runtime()) {
        return Err(TensorError::Runtime);
    }
    check_axes(axes_a, a.rank())?;
    check_axes(axes_b, b.rank())?;
    if axes_a.len() != axes_b.len() {
        return Err(TensorError::InvalidAxes(axes_b.to_vec()));
    }
    if a.data_type() != b.data_type() {
        return Err(TensorError::Type(a.data_type(), b.data_type()));
    }
    let matched = || axes_a.iter().zip_eq(axes_b);
    if matched().any(|(&x, &y)| a.block_shape()[x] != b.block_shape()[y]) {
        return Err(TensorError::IncompatibleBlocking(
            a.block_shape().clone(),
            b.block_shape().clone(),
        ));
    }
    if matched().any(|(&x, &y)| a.shape()[x] != b.shape()[y]) {
        return Err(TensorError::InvalidShape(a.shape().clone(), b.shape().clone()));
    }

    let shape = a.shape().remove(axes_a).concat(&b.shape().remove(axes_b));
    let block_shape = a
        .block_shape()
        .remove(axes_a)
        .concat(&b.block_shape().remove(axes_b));
    let grid = a.grid().remove(axes_a).concat(&b.grid().remove(axes_b));
    let inner: Shape = axes_a.iter().map(|&axis| a.grid()[axis]).collect_vec().into();
    let split = a.rank() - axes_a.len();

    let select = |tensor: &Tensor<S>, outer: &[usize], axes: &[usize], k: &[usize]| {
        expand(outer, axes, k)
            .and_then(|coord| tensor.blocks().get(&coord))
            .map(|handle| handle.ir(Access::ReadOnly))
            .ok_or_else(|| TensorError::Index(Slice::point(outer), tensor.grid().clone()))
    };

    let runtime = a.runtime().clone();
    let r#type = a.data_type();
    let id = runtime.scope_id();
    let op_axes: [Arc<[usize]>; 2] = [axes_a.into(), axes_b.into()];

    let blocks = {
        let scope = runtime.open(id);
        Grid::from_fn(grid, |coord| {
            let (outer_a, outer_b) = coord.split_at(split);
            let pairs = inner
                .indices()
                .map(|k| {
                    let x = select(a, outer_a, axes_a, &k)?;
                    let y = select(b, outer_b, axes_b, &k)?;
                    Ok([x, y])
                })
                .collect::<Result<Vec<[BlockIr; 2]>, TensorError>>()?;

            let output = BlockHandle::new(runtime.block_id(), block_shape.clone(), r#type);
            let op = BlockOp::Tensordot {
                pairs,
                axes: op_axes.clone(),
                output: output.ir(Access::WriteOnly),
            };
            scope.submit(op)?;
            Ok::<_, TensorError>(output)
        })
    };
    let blocks = match blocks {
        Ok(blocks) => blocks,
        Err(err) => {
            runtime.release(id, None);
            return Err(err);
        }
    };

    log::debug!("tensordot {a} × {b} over {axes_a:?}, {axes_b:?} into {id}");
    Ok(Tensor::from_parts(runtime, shape, block_shape, blocks, r#type, id))
}

impl<S: Scheduler> Tensor<S> {
    /// Contracts `axes[0]` of `self` with `axes[1]` of `other`. See [`tensordot`].
    #[inline]
    pub fn tensordot(&self, other: &Self, axes: [&[usize]; 2]) -> Result<Self, TensorError> {
        tensordot(self, other, axes)
    }
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use super::{expand, tensordot};
    use crate::{
        loom::{
            shape::Shape,
            tensor::{Tensor, TensorError},
        },
        runtime::{Local, LocalBuilder, Runtime},
        tuning::ClusterProfile,
    };

    async fn runtime() -> Arc<Runtime<Local>> {
        let profile = ClusterProfile::new(4, 1 << 20);
        let local = LocalBuilder::new().profile(profile).build().await;
        Arc::new(Runtime::new(local, profile))
    }

    #[test]
    fn test_expand() {
        assert_eq!(expand(&[3], &[1], &[7]), Some(vec![3, 7]));
        assert_eq!(expand(&[3, 4], &[2, 0], &[7, 8]), Some(vec![8, 3, 7, 4]));
        assert_eq!(expand(&[], &[], &[]), Some(vec![]));
    }

    #[tokio::test]
    async fn test_ones() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let a = Tensor::ones::<f64>(runtime.clone(), [4, 2], [2, 2])?;
        let b = Tensor::ones::<f64>(runtime.clone(), [2, 4], [2, 2])?;
        let c = tensordot(&a, &b, [&[1], &[0]])?;
        assert_eq!(c.shape(), &Shape::from([4, 4]));
        assert_eq!(c.block_shape(), &Shape::from([2, 2]));
        assert_eq!(c.gather().await?.to_vec::<f64>(), Some(vec![2.0; 16]));

        // k contracted grid cells of extent v sum to k × v
        let a = Tensor::ones::<f32>(runtime.clone(), [2, 6, 3], [1, 2, 3])?;
        let b = Tensor::ones::<f32>(runtime.clone(), [3, 4, 6], [3, 2, 2])?;
        let c = a.tensordot(&b, [&[1, 2], &[2, 0]])?;
        assert_eq!(c.shape(), &Shape::from([2, 4]));
        assert_eq!(c.grid(), &Shape::from([2, 2]));
        assert_eq!(c.gather().await?.to_vec::<f32>(), Some(vec![18.0; 8]));
        Ok(())
    }

    #[tokio::test]
    async fn test_identity() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let mut a = Tensor::zeros::<i64>(runtime.clone(), [4, 6], [2, 3])?;
        for (i, j) in [(0, 0), (1, 4), (3, 5), (2, 2)] {
            a.set(&[i, j], (10 * i + j) as i64 + 1)?;
        }
        let eye = Tensor::eye::<i64>(runtime.clone(), 6, [3, 3])?;
        let c = tensordot(&a, &eye, [&[1], &[0]])?;
        assert_eq!(c.gather().await?, a.gather().await?);

        // contracting the row axis transposes
        let eye = Tensor::eye::<i64>(runtime.clone(), 4, [2, 2])?;
        let c = tensordot(&a, &eye, [&[0], &[1]])?;
        assert_eq!(c.shape(), &Shape::from([6, 4]));
        assert_eq!(c.get::<i64>(&[4, 1]).await?, 15);
        assert_eq!(c.get::<i64>(&[5, 3]).await?, 36);
        Ok(())
    }

    #[tokio::test]
    async fn test_unsorted_axes() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let mut a = Tensor::zeros::<f64>(runtime.clone(), [2, 4], [1, 2])?;
        let mut b = Tensor::zeros::<f64>(runtime.clone(), [4, 2], [2, 1])?;
        for (i, j) in [(0, 0), (0, 3), (1, 1), (1, 2)] {
            a.set(&[i, j], (i + j + 1) as f64)?;
            b.set(&[j, i], (i * j + 1) as f64)?;
        }
        let c = tensordot(&a, &b, [&[1, 0], &[0, 1]])?;
        assert_eq!(c.shape(), &Shape::from(vec![]));
        // 1 * 1 + 4 * 1 + 3 * 2 + 4 * 3
        assert_eq!(c.get::<f64>(&[]).await?, 23.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_outer() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let a = Tensor::full(runtime.clone(), 2.0f32, [2], [1])?;
        let b = Tensor::full(runtime.clone(), 3.0f32, [3], [3])?;
        let c = tensordot(&a, &b, [&[], &[]])?;
        assert_eq!(c.shape(), &Shape::from([2, 3]));
        assert_eq!(c.gather().await?.to_vec::<f32>(), Some(vec![6.0; 6]));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid() -> Result<(), Box<dyn Error>> {
        let runtime = runtime().await;
        let a = Tensor::ones::<f64>(runtime.clone(), [4, 4], [2, 2])?;
        let b = Tensor::ones::<f64>(runtime.clone(), [4, 4], [4, 1])?;
        let c = Tensor::ones::<f32>(runtime.clone(), [4, 4], [2, 2])?;
        let d = Tensor::ones::<f64>(runtime.clone(), [2, 4], [2, 2])?;

        let result = tensordot(&a, &a, [&[0, 0], &[0, 1]]);
        assert!(matches!(result, Err(TensorError::InvalidAxes(_))));
        let result = tensordot(&a, &a, [&[0, 1], &[1, 1]]);
        assert!(matches!(result, Err(TensorError::InvalidAxes(_))));
        let result = tensordot(&a, &a, [&[2], &[0]]);
        assert!(matches!(result, Err(TensorError::InvalidAxes(_))));
        let result = tensordot(&a, &a, [&[0], &[0, 1]]);
        assert!(matches!(result, Err(TensorError::InvalidAxes(_))));

        let result = tensordot(&a, &b, [&[1], &[0]]);
        assert!(matches!(result, Err(TensorError::IncompatibleBlocking(..))));
        let result = tensordot(&a, &c, [&[1], &[0]]);
        assert!(matches!(result, Err(TensorError::Type(..))));
        let result = tensordot(&a, &d, [&[1], &[0]]);
        assert!(matches!(result, Err(TensorError::InvalidShape(..))));

        let other = {
            let profile = ClusterProfile::default();
            let local = LocalBuilder::new().build().await;
            Arc::new(Runtime::new(local, profile))
        };
        let e = Tensor::ones::<f64>(other, [4, 4], [2, 2])?;
        let result = tensordot(&a, &e, [&[1], &[0]]);
        assert!(matches!(result, Err(TensorError::Runtime)));
        Ok(())
    }
}
