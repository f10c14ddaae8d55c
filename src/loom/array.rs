use std::sync::Arc;

use derive_more::{Display, From};

use super::{
    block::{Block, BlockId},
    num::DataType,
    ops::{Access, BlockIr, BlockOp},
    shape::{Shape, is_permutation, is_unique},
    tensor::{Tensor, TensorError},
};
use crate::{
    hal::{Kernel, KernelError, cpu},
    runtime::Scheduler,
};

/// Either an in-process dense array or a block-distributed tensor.
///
/// Binary ops dispatch on both variants and refuse to mix them.
#[derive(Debug, Display, From)]
pub enum Array<S: Scheduler> {
    #[display("{_0}")]
    Dense(Block),
    #[display("{_0}")]
    Blocked(Tensor<S>),
}

fn dense_ir(block: &Block, access: Access) -> BlockIr {
    BlockIr {
        shape: block.shape().clone(),
        r#type: block.data_type(),
        id: BlockId::default(),
        access,
    }
}

/// Runs one CPU kernel on in-process blocks, returning every output.
fn run_all(kernel: Kernel, op: &BlockOp, inputs: &[&Block]) -> Result<Vec<Block>, TensorError> {
    let inputs: Vec<_> = inputs.iter().map(|&block| Arc::new(block.clone())).collect();
    let outputs = kernel(op, &inputs)?;
    match outputs.len() == op.outputs().len() {
        true => Ok(outputs),
        false => Err(KernelError::Arity(op.outputs().len(), outputs.len()).into()),
    }
}

/// Runs one CPU kernel with a single output on in-process blocks.
fn run(kernel: Kernel, op: &BlockOp, inputs: &[&Block]) -> Result<Block, TensorError> {
    let mut outputs = run_all(kernel, op, inputs)?;
    outputs
        .pop()
        .ok_or(TensorError::Kernel(KernelError::Arity(1, 0)))
}

fn output_ir(shape: impl Into<Shape>, r#type: DataType) -> BlockIr {
    BlockIr {
        shape: shape.into(),
        r#type,
        id: BlockId::default(),
        access: Access::WriteOnly,
    }
}

/// Checks that an array is a matrix and returns its extents along with `min(m, n)`.
fn matrix(shape: &Shape) -> Result<[usize; 3], TensorError> {
    match shape.len() {
        2 => Ok([shape[0], shape[1], shape[0].min(shape[1])]),
        _ => Err(TensorError::InvalidShape(shape.clone(), Shape::from([0, 0]))),
    }
}

impl<S: Scheduler> Array<S> {
    pub fn shape(&self) -> &Shape {
        match self {
            Array::Dense(block) => block.shape(),
            Array::Blocked(tensor) => tensor.shape(),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Array::Dense(block) => block.data_type(),
            Array::Blocked(tensor) => tensor.data_type(),
        }
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    pub fn transpose(&mut self, axes: &[usize]) -> Result<(), TensorError> {
        match self {
            Array::Dense(block) => {
                if !is_permutation(axes, block.shape().len()) {
                    return Err(TensorError::InvalidAxes(axes.to_vec()));
                }
                let op = BlockOp::Transpose {
                    block: dense_ir(block, Access::ReadWrite),
                    axes: axes.into(),
                };
                *block = run(cpu::transpose, &op, &[&*block])?;
                Ok(())
            }
            Array::Blocked(tensor) => tensor.transpose(axes),
        }
    }

    pub fn tensordot(&self, other: &Self, axes: [&[usize]; 2]) -> Result<Self, TensorError> {
        match (self, other) {
            (Array::Dense(a), Array::Dense(b)) => {
                let [axes_a, axes_b] = axes;
                if !is_unique(axes_a) || !is_unique(axes_b) || axes_a.len() != axes_b.len() {
                    return Err(TensorError::InvalidAxes(axes_a.to_vec()));
                }
                if a.data_type() != b.data_type() {
                    return Err(TensorError::Type(a.data_type(), b.data_type()));
                }
                if axes_a.iter().any(|&axis| axis >= a.shape().len()) {
                    return Err(TensorError::InvalidAxes(axes_a.to_vec()));
                }
                if axes_b.iter().any(|&axis| axis >= b.shape().len()) {
                    return Err(TensorError::InvalidAxes(axes_b.to_vec()));
                }

                let shape = a.shape().remove(axes_a).concat(&b.shape().remove(axes_b));
                let output = BlockIr {
                    shape,
                    r#type: a.data_type(),
                    id: BlockId::default(),
                    access: Access::WriteOnly,
                };
                let op = BlockOp::Tensordot {
                    pairs: vec![[dense_ir(a, Access::ReadOnly), dense_ir(b, Access::ReadOnly)]],
                    axes: [axes_a.into(), axes_b.into()],
                    output,
                };
                Ok(Array::Dense(run(cpu::tensordot, &op, &[a, b])?))
            }
            (Array::Blocked(a), Array::Blocked(b)) => Ok(Array::Blocked(a.tensordot(b, axes)?)),
            _ => Err(TensorError::Variant),
        }
    }

    /// Thin singular value decomposition `self = u · diag(s) · vt` of a matrix.
    ///
    /// Singular values come in descending order. Only float arrays are supported.
    pub fn svd(&self) -> Result<(Self, Self, Self), TensorError> {
        match self {
            Array::Dense(block) => {
                let [m, n, k] = matrix(block.shape())?;
                let r#type = block.data_type();
                let op = BlockOp::Svd {
                    input: dense_ir(block, Access::ReadOnly),
                    u: output_ir([m, k], r#type),
                    s: output_ir([k], r#type),
                    vt: output_ir([k, n], r#type),
                };
                let mut factors = run_all(cpu::svd, &op, &[block])?
                    .into_iter()
                    .map(Array::Dense);
                match (factors.next(), factors.next(), factors.next()) {
                    (Some(u), Some(s), Some(vt)) => Ok((u, s, vt)),
                    _ => Err(KernelError::Arity(3, 0).into()),
                }
            }
            Array::Blocked(_) => Err(TensorError::NotImplemented("blocked svd")),
        }
    }

    /// The singular values of a matrix, in descending order.
    pub fn svd_values(&self) -> Result<Self, TensorError> {
        match self {
            Array::Dense(block) => {
                let [_, _, k] = matrix(block.shape())?;
                let op = BlockOp::SvdValues {
                    input: dense_ir(block, Access::ReadOnly),
                    s: output_ir([k], block.data_type()),
                };
                Ok(Array::Dense(run(cpu::svd_values, &op, &[block])?))
            }
            Array::Blocked(_) => Err(TensorError::NotImplemented("blocked svd")),
        }
    }

    /// Splits a matrix into `us · vt`, with the singular values folded into `us`.
    pub fn svd_matrix(&self) -> Result<(Self, Self), TensorError> {
        match self {
            Array::Dense(block) => {
                let [m, n, k] = matrix(block.shape())?;
                let r#type = block.data_type();
                let op = BlockOp::SvdMatrix {
                    input: dense_ir(block, Access::ReadOnly),
                    us: output_ir([m, k], r#type),
                    vt: output_ir([k, n], r#type),
                };
                let mut factors = run_all(cpu::svd_matrix, &op, &[block])?
                    .into_iter()
                    .map(Array::Dense);
                match (factors.next(), factors.next()) {
                    (Some(us), Some(vt)) => Ok((us, vt)),
                    _ => Err(KernelError::Arity(2, 0).into()),
                }
            }
            Array::Blocked(_) => Err(TensorError::NotImplemented("blocked svd")),
        }
    }

    /// Materializes the array in memory, gathering blocks if needed.
    pub async fn to_dense(&self) -> Result<Block, TensorError> {
        match self {
            Array::Dense(block) => Ok(block.clone()),
            Array::Blocked(tensor) => tensor.gather().await,
        }
    }
}
