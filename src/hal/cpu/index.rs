use std::sync::Arc;

use crate::{
    hal::{KernelError, check_arity},
    loom::{block::Block, ops::BlockOp},
};

/// Overwrites one element. The value arrives as raw bytes of the block's type.
pub fn set_value(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::SetValue { block: ir, index, value } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 1)?;

    let block = &inputs[0];
    let r#type = block.data_type();
    if r#type != ir.r#type {
        return Err(KernelError::Type(r#type, ir.r#type));
    }
    if value.len() != r#type.size() {
        return Err(KernelError::Value(value.len(), r#type));
    }
    let offset = block
        .shape()
        .offset(index)
        .ok_or_else(|| KernelError::Index(index.to_vec(), block.shape().clone()))?;

    let mut data = block.bytes().to_vec();
    let start = offset * r#type.size();
    data[start..start + r#type.size()].copy_from_slice(value);

    let output = Block::from_bytes(block.shape().clone(), r#type, data.into())
        .ok_or(KernelError::Value(value.len(), r#type))?;
    Ok(vec![output])
}
