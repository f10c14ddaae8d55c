use std::sync::Arc;

use derive_more::Display;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{block::BlockId, num::DataType, shape::Shape};
use crate::{runtime::ScopeId, tuning::variant::TaskVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, Serialize, Deserialize)]
pub enum Access {
    ReadOnly,
    ReadWrite,
    WriteOnly,
}

/// What an op knows about one of its blocks: shape, type and identity, never contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockIr {
    pub shape: Shape,
    pub r#type: DataType,
    pub id: BlockId,
    pub access: Access,
}

impl BlockIr {
    #[inline]
    pub fn data_size(&self) -> usize {
        self.shape.size() * self.r#type.size()
    }

    /// Returns `true` if the op reads the block.
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self.access, Access::ReadOnly | Access::ReadWrite)
    }

    /// Returns `true` if the op writes the block.
    #[inline]
    pub fn is_output(&self) -> bool {
        matches!(self.access, Access::WriteOnly | Access::ReadWrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum OpKind {
    #[display("full")]
    Full,
    #[display("rand")]
    Rand,
    #[display("eye")]
    Eye,
    #[display("reshape")]
    Reshape,
    #[display("transpose")]
    Transpose,
    #[display("tensordot")]
    Tensordot,
    #[display("set_value")]
    SetValue,
    #[display("count_nonzero")]
    CountNonzero,
    #[display("svd")]
    Svd,
    #[display("svd_values")]
    SvdValues,
    #[display("svd_matrix")]
    SvdMatrix,
}

/// A unit of work on blocks, described by shapes and types only.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockOp {
    /// Fills the output with one element, stored as raw bytes of the output type.
    Full { output: BlockIr, value: Arc<[u8]> },
    /// Fills the output with uniform samples in `[0, 1)`.
    Rand { output: BlockIr, seed: u64 },
    /// The block at grid coordinate `coord` of an `n × n` identity.
    Eye {
        output: BlockIr,
        n: usize,
        coord: [usize; 2],
    },
    /// Permutes the axes of a block in place.
    Transpose { block: BlockIr, axes: Arc<[usize]> },
    /// Sums the pairwise contractions of `pairs` over `axes` into the output.
    Tensordot {
        pairs: Vec<[BlockIr; 2]>,
        axes: [Arc<[usize]>; 2],
        output: BlockIr,
    },
    /// Overwrites one element of a block.
    SetValue {
        block: BlockIr,
        index: Arc<[usize]>,
        value: Arc<[u8]>,
    },
    /// Counts the nonzero elements of the input into a rank-0 `I64` output.
    CountNonzero { input: BlockIr, output: BlockIr },
    /// Thin singular value decomposition of a matrix block, `input = u · diag(s) · vt`.
    Svd {
        input: BlockIr,
        u: BlockIr,
        s: BlockIr,
        vt: BlockIr,
    },
    /// Singular values only, in descending order.
    SvdValues { input: BlockIr, s: BlockIr },
    /// The decomposition with the singular values folded into the left factor.
    SvdMatrix {
        input: BlockIr,
        us: BlockIr,
        vt: BlockIr,
    },
}

impl BlockOp {
    #[inline]
    pub fn kind(&self) -> OpKind {
        match self {
            BlockOp::Full { .. } => OpKind::Full,
            BlockOp::Rand { .. } => OpKind::Rand,
            BlockOp::Eye { .. } => OpKind::Eye,
            BlockOp::Transpose { .. } => OpKind::Transpose,
            BlockOp::Tensordot { .. } => OpKind::Tensordot,
            BlockOp::SetValue { .. } => OpKind::SetValue,
            BlockOp::CountNonzero { .. } => OpKind::CountNonzero,
            BlockOp::Svd { .. } => OpKind::Svd,
            BlockOp::SvdValues { .. } => OpKind::SvdValues,
            BlockOp::SvdMatrix { .. } => OpKind::SvdMatrix,
        }
    }

    /// Input and output blocks, inputs first.
    pub fn io(&self) -> Vec<BlockIr> {
        match self {
            BlockOp::Full { output, .. }
            | BlockOp::Rand { output, .. }
            | BlockOp::Eye { output, .. } => vec![output.clone()],
            BlockOp::Transpose { block, .. } | BlockOp::SetValue { block, .. } => {
                vec![block.clone()]
            }
            BlockOp::Tensordot { pairs, output, .. } => pairs
                .iter()
                .flatten()
                .chain(std::iter::once(output))
                .cloned()
                .collect(),
            BlockOp::CountNonzero { input, output } => vec![input.clone(), output.clone()],
            BlockOp::Svd { input, u, s, vt } => {
                vec![input.clone(), u.clone(), s.clone(), vt.clone()]
            }
            BlockOp::SvdValues { input, s } => vec![input.clone(), s.clone()],
            BlockOp::SvdMatrix { input, us, vt } => vec![input.clone(), us.clone(), vt.clone()],
        }
    }

    /// Blocks the op reads, in the order the kernel expects them.
    pub fn inputs(&self) -> Vec<BlockId> {
        self.io()
            .into_iter()
            .filter(BlockIr::is_input)
            .map(|ir| ir.id)
            .collect()
    }

    /// Blocks the op writes, in the order the kernel returns them.
    pub fn outputs(&self) -> Vec<BlockIr> {
        self.io().into_iter().filter(BlockIr::is_output).collect()
    }
}

impl std::fmt::Display for BlockOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let io = self.io();
        let inputs = io.iter().filter(|ir| ir.is_input()).map(|ir| ir.id).format(", ");
        let outputs = io.iter().filter(|ir| ir.is_output()).map(|ir| ir.id).format(", ");
        write!(f, "{}({inputs}) -> ({outputs})", self.kind())
    }
}

/// A block op ready for dispatch: tuned, registered under a scope.
#[derive(Debug, Clone)]
pub struct Task {
    pub scope: ScopeId,
    pub variant: Arc<TaskVariant>,
    pub op: BlockOp,
}
