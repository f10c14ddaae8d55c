//! Memory cost models. Every estimate is computed from shapes and types alone,
//! so it is available before any block is resolved.

use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;

use crate::loom::ops::{Access, BlockIr, BlockOp, OpKind};

#[derive(Debug, Clone, Error)]
pub enum CostError {
    #[error("no cost model registered for {0}")]
    Unavailable(OpKind),
    #[error("cost model cannot read its operands: {0}")]
    Mismatch(&'static str),
}

/// Estimates the bytes an op needs from the blocks it touches.
pub type CostFn = fn(&[BlockIr]) -> Result<usize, CostError>;

#[derive(Debug, Clone)]
pub struct CostRegistry {
    models: HashMap<OpKind, CostFn>,
}

impl Default for CostRegistry {
    fn default() -> Self {
        Self::empty()
            .register(OpKind::Full, full)
            .register(OpKind::Rand, full)
            .register(OpKind::Eye, full)
            .register(OpKind::Reshape, reshape)
            .register(OpKind::Transpose, transpose)
            .register(OpKind::Tensordot, tensordot)
            .register(OpKind::SetValue, reshape)
            .register(OpKind::CountNonzero, reshape)
            .register(OpKind::Svd, decomposition)
            .register(OpKind::SvdValues, decomposition)
            .register(OpKind::SvdMatrix, decomposition)
    }
}

impl CostRegistry {
    /// A registry without any model. Every estimate is unavailable.
    pub fn empty() -> Self {
        Self {
            models: HashMap::default(),
        }
    }

    pub fn register(mut self, kind: OpKind, model: CostFn) -> Self {
        self.models.insert(kind, model);
        self
    }

    pub fn estimate(&self, kind: OpKind, io: &[BlockIr]) -> Result<usize, CostError> {
        match self.models.get(&kind) {
            Some(model) => model(io),
            None => Err(CostError::Unavailable(kind)),
        }
    }

    #[inline]
    pub fn estimate_op(&self, op: &BlockOp) -> Result<usize, CostError> {
        self.estimate(op.kind(), &op.io())
    }
}

fn sum(io: &[BlockIr], filter: impl Fn(&BlockIr) -> bool) -> usize {
    io.iter().filter(|&ir| filter(ir)).map(BlockIr::data_size).sum()
}

/// `product(shape) * itemsize` of what gets created.
pub fn full(io: &[BlockIr]) -> Result<usize, CostError> {
    match sum(io, |ir| ir.access == Access::WriteOnly) {
        0 => Err(CostError::Mismatch("no output to fill")),
        size => Ok(size),
    }
}

/// The input size; nothing is copied.
pub fn reshape(io: &[BlockIr]) -> Result<usize, CostError> {
    match sum(io, BlockIr::is_input) {
        0 => Err(CostError::Mismatch("no input to read")),
        size => Ok(size),
    }
}

/// Twice the input size, as the permutation goes through an auxiliary buffer.
pub fn transpose(io: &[BlockIr]) -> Result<usize, CostError> {
    reshape(io).map(|size| 2 * size)
}

/// Both operands plus the output.
pub fn tensordot(io: &[BlockIr]) -> Result<usize, CostError> {
    let inputs = io.iter().filter(|ir| ir.access == Access::ReadOnly);
    let output = io.iter().filter(|ir| ir.access == Access::WriteOnly);
    let (Some(first), Some(out)) = (inputs.clone().next(), output.clone().next()) else {
        return Err(CostError::Mismatch("tensordot needs operands and an output"));
    };
    if inputs.clone().count() % 2 != 0 {
        return Err(CostError::Mismatch("tensordot operands come in pairs"));
    }
    if inputs.clone().any(|ir| ir.r#type != first.r#type) || out.r#type != first.r#type {
        return Err(CostError::Mismatch("tensordot operands differ in type"));
    }
    Ok(inputs.chain(output).map(BlockIr::data_size).sum())
}

/// The input, a working copy of it, and every factor produced.
pub fn decomposition(io: &[BlockIr]) -> Result<usize, CostError> {
    let input = reshape(io)?;
    match sum(io, |ir| ir.access == Access::WriteOnly) {
        0 => Err(CostError::Mismatch("decomposition produces no factor")),
        factors => Ok(2 * input + factors),
    }
}

#[cfg(test)]
mod tests {
    use super::{CostError, CostRegistry};
    use crate::loom::{
        block::BlockId,
        num::DataType,
        ops::{Access, BlockIr, OpKind},
        shape::Shape,
    };

    fn ir(shape: impl Into<Shape>, r#type: DataType, access: Access) -> BlockIr {
        BlockIr {
            shape: shape.into(),
            r#type,
            id: BlockId::default(),
            access,
        }
    }

    #[test]
    fn test_estimates() -> Result<(), CostError> {
        let registry = CostRegistry::default();

        let io = [ir([4, 4], DataType::F64, Access::WriteOnly)];
        assert_eq!(registry.estimate(OpKind::Full, &io)?, 128);

        let io = [ir([4, 4], DataType::F32, Access::ReadOnly)];
        assert_eq!(registry.estimate(OpKind::Reshape, &io)?, 64);

        let io = [ir([4, 4], DataType::F32, Access::ReadWrite)];
        assert_eq!(registry.estimate(OpKind::Transpose, &io)?, 128);

        let io = [
            ir([4, 2], DataType::F64, Access::ReadOnly),
            ir([2, 4], DataType::F64, Access::ReadOnly),
            ir([4, 4], DataType::F64, Access::WriteOnly),
        ];
        assert_eq!(registry.estimate(OpKind::Tensordot, &io)?, 64 + 64 + 128);

        let io = [
            ir([4, 2], DataType::F64, Access::ReadOnly),
            ir([4, 2], DataType::F64, Access::WriteOnly),
            ir([2], DataType::F64, Access::WriteOnly),
            ir([2, 2], DataType::F64, Access::WriteOnly),
        ];
        assert_eq!(registry.estimate(OpKind::Svd, &io)?, 2 * 64 + 64 + 16 + 32);
        Ok(())
    }

    #[test]
    fn test_unavailable() {
        let io = [ir([4], DataType::F64, Access::WriteOnly)];
        assert!(matches!(
            CostRegistry::empty().estimate(OpKind::Full, &io),
            Err(CostError::Unavailable(OpKind::Full))
        ));

        let io = [
            ir([4, 2], DataType::F64, Access::ReadOnly),
            ir([2, 4], DataType::F32, Access::ReadOnly),
            ir([4, 4], DataType::F64, Access::WriteOnly),
        ];
        assert!(matches!(
            CostRegistry::default().estimate(OpKind::Tensordot, &io),
            Err(CostError::Mismatch(_))
        ));
    }
}
