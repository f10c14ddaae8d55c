use std::sync::Arc;

use itertools::Itertools;

use crate::{
    dispatch_type,
    hal::{KernelError, check_arity},
    loom::{
        block::Block,
        num::Scalar,
        ops::BlockOp,
        shape::{Shape, is_unique},
    },
};

/// Offsets of one operand: where each outer index and each contracted index starts.
struct Plan {
    outer: Vec<usize>,
    inner: Vec<usize>,
}

impl Plan {
    fn new(shape: &Shape, axes: &[usize]) -> Self {
        let strides = shape.strides();
        let outer_axes = (0..shape.len()).filter(|x| !axes.contains(x)).collect_vec();
        let offsets = |axes: &[usize]| -> Vec<usize> {
            let extents: Shape = axes.iter().map(|&axis| shape[axis]).collect_vec().into();
            extents
                .indices()
                .map(|index| index.iter().zip_eq(axes).map(|(i, &axis)| i * strides[axis]).sum())
                .collect()
        };
        Self {
            outer: offsets(&outer_axes),
            inner: offsets(axes),
        }
    }
}

/// Validates one pair of blocks against the contracted axes.
fn check_pair(a: &Block, b: &Block, [axes_a, axes_b]: [&[usize]; 2]) -> Result<(), KernelError> {
    if a.data_type() != b.data_type() {
        return Err(KernelError::Type(a.data_type(), b.data_type()));
    }
    let valid = |shape: &Shape, axes: &[usize]| {
        is_unique(axes) && axes.iter().all(|&axis| axis < shape.len())
    };
    if axes_a.len() != axes_b.len() || !valid(a.shape(), axes_a) {
        return Err(KernelError::Axes(axes_a.to_vec(), a.shape().clone()));
    }
    if !valid(b.shape(), axes_b) {
        return Err(KernelError::Axes(axes_b.to_vec(), b.shape().clone()));
    }
    if axes_a
        .iter()
        .zip_eq(axes_b)
        .any(|(&x, &y)| a.shape()[x] != b.shape()[y])
    {
        return Err(KernelError::Shape(a.shape().clone(), b.shape().clone()));
    }
    Ok(())
}

/// Accumulates the contraction of `a` and `b` into `acc`, laid out as `outer(a) ++ outer(b)`.
fn contract<T: Scalar>(a: &Block, b: &Block, [axes_a, axes_b]: [&[usize]; 2], acc: &mut [T]) {
    let (Some(x), Some(y)) = (a.read_slice::<T>(), b.read_slice::<T>()) else {
        return;
    };
    let plan_a = Plan::new(a.shape(), axes_a);
    let plan_b = Plan::new(b.shape(), axes_b);
    let inner = plan_a.inner.iter().zip_eq(plan_b.inner.iter()).collect_vec();

    let row = |offset_a: usize, acc: &mut [T]| {
        for (z, &offset_b) in acc.iter_mut().zip_eq(plan_b.outer.iter()) {
            *z = inner.iter().fold(*z, |sum, &(&i, &j)| {
                sum + x[offset_a + i] * y[offset_b + j]
            });
        }
    };

    #[cfg(not(feature = "rayon"))]
    for (acc, &offset_a) in acc
        .chunks_mut(plan_b.outer.len())
        .zip_eq(plan_a.outer.iter())
    {
        row(offset_a, acc);
    }

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        acc.par_chunks_mut(plan_b.outer.len())
            .zip_eq(plan_a.outer.par_iter())
            .for_each(|(acc, &offset_a)| row(offset_a, acc));
    }
}

fn sum_pairs<T: Scalar>(
    pairs: &[Arc<Block>],
    axes: [&[usize]; 2],
    shape: &Shape,
) -> Result<Vec<u8>, KernelError> {
    let mut acc = vec![T::zero(); shape.size()];
    for (a, b) in pairs.iter().tuples() {
        check_pair(a, b, axes)?;
        let [axes_a, axes_b] = axes;
        let expected = a.shape().remove(axes_a).concat(&b.shape().remove(axes_b));
        if &expected != shape {
            return Err(KernelError::Shape(expected, shape.clone()));
        }
        contract::<T>(a, b, axes, &mut acc);
    }
    Ok(bytemuck::cast_slice::<T, u8>(&acc).to_vec())
}

/// Computes `Σ_k tensordot(a_k, b_k, axes)` over every pair of input blocks.
///
/// Inputs arrive interleaved as `a_0, b_0, a_1, b_1, ...`.
pub fn tensordot(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::Tensordot {
        pairs,
        axes: [axes_a, axes_b],
        output,
    } = op
    else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 2 * pairs.len())?;
    if let Some(block) = inputs.iter().find(|block| block.data_type() != output.r#type) {
        return Err(KernelError::Type(block.data_type(), output.r#type));
    }

    let axes = [&axes_a[..], &axes_b[..]];
    let data = dispatch_type!(output.r#type, T => sum_pairs::<T>(inputs, axes, &output.shape))?;
    let len = data.len();
    let block = Block::from_bytes(output.shape.clone(), output.r#type, data.into())
        .ok_or(KernelError::Value(len, output.r#type))?;
    Ok(vec![block])
}
