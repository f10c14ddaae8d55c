//! Reference numerical kernels. Each kernel sees one op and its materialized input blocks,
//! and knows nothing about grids, scopes or scheduling.

use std::sync::Arc;

use thiserror::Error;

use crate::loom::{
    block::Block,
    num::DataType,
    ops::{BlockOp, OpKind},
    shape::Shape,
};

pub mod cpu;

#[derive(Debug, Clone, Error)]
pub enum KernelError {
    #[error("kernel for {0} received a mismatched op")]
    Op(OpKind),
    #[error("kernel expected {0} input blocks, got {1}")]
    Arity(usize, usize),
    #[error("block type {0} mismatches {1}")]
    Type(DataType, DataType),
    #[error("block type {0} is not supported by this kernel")]
    Unsupported(DataType),
    #[error("block shape {0} mismatches {1}")]
    Shape(Shape, Shape),
    #[error("index {0:?} is out of bounds for shape {1}")]
    Index(Vec<usize>, Shape),
    #[error("invalid axes {0:?} for shape {1}")]
    Axes(Vec<usize>, Shape),
    #[error("value of {0} bytes does not fit type {1}")]
    Value(usize, DataType),
}

/// Executes one op on materialized inputs, returning its outputs in [`BlockOp::outputs`] order.
pub type Kernel = fn(&BlockOp, &[Arc<Block>]) -> Result<Vec<Block>, KernelError>;

/// Checks the number of inputs handed to a kernel.
pub(crate) fn check_arity(inputs: &[Arc<Block>], expected: usize) -> Result<(), KernelError> {
    match inputs.len() == expected {
        true => Ok(()),
        false => Err(KernelError::Arity(expected, inputs.len())),
    }
}
