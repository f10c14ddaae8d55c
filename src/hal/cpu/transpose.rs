use std::sync::Arc;

use itertools::Itertools;

use crate::{
    dispatch_type,
    hal::{KernelError, check_arity},
    loom::{
        block::Block,
        num::Scalar,
        ops::BlockOp,
        shape::{Shape, is_permutation},
    },
};

fn permute<T: Scalar>(block: &Block, axes: &[usize], shape: &Shape) -> Option<Vec<u8>> {
    let x = block.read_slice::<T>()?;
    let strides = block.shape().strides();
    let contents = shape
        .indices()
        .map(|index| {
            let offset: usize = index
                .iter()
                .zip_eq(axes)
                .map(|(i, &axis)| i * strides[axis])
                .sum();
            x[offset]
        })
        .collect_vec();
    Some(bytemuck::cast_slice::<T, u8>(&contents).to_vec())
}

pub fn transpose(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::Transpose { block: ir, axes } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 1)?;

    let block = &inputs[0];
    if block.data_type() != ir.r#type {
        return Err(KernelError::Type(block.data_type(), ir.r#type));
    }
    if !is_permutation(axes, block.shape().len()) {
        return Err(KernelError::Axes(axes.to_vec(), block.shape().clone()));
    }

    let shape = block.shape().permute(axes);
    let data = dispatch_type!(block.data_type(), T => permute::<T>(block, axes, &shape))
        .ok_or(KernelError::Type(block.data_type(), ir.r#type))?;
    let output = Block::from_bytes(shape, block.data_type(), data.into())
        .ok_or(KernelError::Shape(block.shape().clone(), ir.shape.clone()))?;
    Ok(vec![output])
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use super::transpose;
    use crate::loom::{
        block::{Block, BlockId},
        num::DataType,
        ops::{Access, BlockIr, BlockOp},
        shape::Shape,
    };

    fn op(shape: impl Into<Shape>, axes: Vec<usize>) -> BlockOp {
        BlockOp::Transpose {
            block: BlockIr {
                shape: shape.into(),
                r#type: DataType::I32,
                id: BlockId(0),
                access: Access::ReadWrite,
            },
            axes: axes.into(),
        }
    }

    #[test]
    fn test_transpose() -> Result<(), Box<dyn Error>> {
        let block = Arc::new(Block::from_vec([2, 2], vec![1, 2, 3, 4]).ok_or("bad block")?);

        let output = transpose(&op([2, 2], vec![0, 1]), &[block.clone()])?.remove(0);
        assert_eq!(output.to_vec::<i32>(), Some(vec![1, 2, 3, 4]));

        let output = transpose(&op([2, 2], vec![1, 0]), &[block.clone()])?.remove(0);
        assert_eq!(output.to_vec::<i32>(), Some(vec![1, 3, 2, 4]));

        assert!(transpose(&op([2, 2], vec![1, 1]), &[block]).is_err());
        Ok(())
    }

    #[test]
    fn test_transpose_rank_3() -> Result<(), Box<dyn Error>> {
        let contents = (0..24).collect::<Vec<i32>>();
        let block = Arc::new(Block::from_vec([2, 3, 4], contents).ok_or("bad block")?);
        let output = transpose(&op([2, 3, 4], vec![2, 0, 1]), &[block.clone()])?.remove(0);
        assert_eq!(output.shape().to_vec(), vec![4, 2, 3]);
        // output[k, i, j] == input[i, j, k]
        assert_eq!(output.read::<i32>(&[3, 1, 2]), block.read::<i32>(&[1, 2, 3]));

        let back = Arc::new(output);
        let output = transpose(&op([4, 2, 3], vec![1, 2, 0]), &[back])?.remove(0);
        assert_eq!(output, *block);
        Ok(())
    }
}
