use std::sync::Arc;

use crate::{
    dispatch_type,
    hal::{KernelError, check_arity},
    loom::{block::Block, num::Scalar, ops::BlockOp},
};

fn count<T: Scalar>(block: &Block) -> i64 {
    block
        .read_slice::<T>()
        .map_or(0, |x| x.iter().filter(|x| !x.is_zero()).count() as i64)
}

pub fn count_nonzero(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::CountNonzero { output, .. } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 1)?;

    let block = &inputs[0];
    let count = dispatch_type!(block.data_type(), T => count::<T>(block));
    let output = Block::from_vec(output.shape.clone(), vec![count])
        .ok_or(KernelError::Value(size_of::<i64>(), output.r#type))?;
    Ok(vec![output])
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use super::count_nonzero;
    use crate::loom::{
        block::{Block, BlockId},
        num::DataType,
        ops::{Access, BlockIr, BlockOp},
        shape::Shape,
    };

    #[test]
    fn test_count_nonzero() -> Result<(), Box<dyn Error>> {
        let block = Arc::new(Block::from_vec([2, 3], vec![0.0, 1.5, 0.0, -2.0, 0.0, 3.0]).ok_or("x")?);
        let op = BlockOp::CountNonzero {
            input: BlockIr {
                shape: block.shape().clone(),
                r#type: block.data_type(),
                id: BlockId(0),
                access: Access::ReadOnly,
            },
            output: BlockIr {
                shape: Shape::default(),
                r#type: DataType::I64,
                id: BlockId(1),
                access: Access::WriteOnly,
            },
        };
        let output = count_nonzero(&op, &[block])?.remove(0);
        assert_eq!(output.read::<i64>(&[]), Some(3));
        Ok(())
    }
}
