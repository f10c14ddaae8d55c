use std::sync::Arc;

use itertools::Itertools;

use crate::{
    dispatch_type,
    hal::{KernelError, check_arity},
    loom::{
        block::Block,
        num::{DataType, Float, Scalar},
        ops::{BlockIr, BlockOp},
    },
};

fn wrap(output: &BlockIr, data: Vec<u8>) -> Result<Block, KernelError> {
    let len = data.len();
    Block::from_bytes(output.shape.clone(), output.r#type, data.into())
        .ok_or(KernelError::Value(len, output.r#type))
}

pub fn full(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::Full { output, value } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 0)?;
    if value.len() != output.r#type.size() {
        return Err(KernelError::Value(value.len(), output.r#type));
    }

    let data = value
        .iter()
        .copied()
        .cycle()
        .take(output.data_size())
        .collect_vec();
    Ok(vec![wrap(output, data)?])
}

fn sample<T: Float>(rng: &mut fastrand::Rng, len: usize) -> Vec<u8> {
    let contents = (0..len).map(|_| T::from_f64(rng.f64())).collect_vec();
    bytemuck::cast_slice::<T, u8>(&contents).to_vec()
}

pub fn rand(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::Rand { output, seed } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 0)?;

    let mut rng = fastrand::Rng::with_seed(*seed);
    let len = output.shape.size();
    let data = match output.r#type {
        DataType::F16 => sample::<half::f16>(&mut rng, len),
        DataType::F32 => sample::<f32>(&mut rng, len),
        DataType::F64 => sample::<f64>(&mut rng, len),
        r#type => return Err(KernelError::Unsupported(r#type)),
    };
    Ok(vec![wrap(output, data)?])
}

fn diagonal<T: Scalar>(output: &BlockIr, n: usize, [i, j]: [usize; 2]) -> Vec<u8> {
    let [rows, cols] = [output.shape[0], output.shape[1]];
    let contents = output
        .shape
        .indices()
        .map(|index| {
            let row = i * rows + index[0];
            let col = j * cols + index[1];
            match row == col && row < n {
                true => T::one(),
                false => T::zero(),
            }
        })
        .collect_vec();
    bytemuck::cast_slice::<T, u8>(&contents).to_vec()
}

pub fn eye(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::Eye { output, n, coord } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 0)?;
    if output.shape.len() != 2 {
        return Err(KernelError::Axes(vec![0, 1], output.shape.clone()));
    }

    let data = dispatch_type!(output.r#type, T => diagonal::<T>(output, *n, *coord));
    Ok(vec![wrap(output, data)?])
}

#[cfg(test)]
mod tests {
    use std::{error::Error, sync::Arc};

    use super::{eye, full, rand};
    use crate::loom::{
        block::BlockId,
        num::DataType,
        ops::{Access, BlockIr, BlockOp},
        shape::Shape,
    };

    fn output(shape: impl Into<Shape>, r#type: DataType) -> BlockIr {
        BlockIr {
            shape: shape.into(),
            r#type,
            id: BlockId(0),
            access: Access::WriteOnly,
        }
    }

    #[test]
    fn test_full() -> Result<(), Box<dyn Error>> {
        let value: Arc<[u8]> = 7i32.to_ne_bytes().into();
        let op = BlockOp::Full {
            output: output([2, 2, 2], DataType::I32),
            value,
        };
        let block = full(&op, &[])?.remove(0);
        assert_eq!(block.to_vec::<i32>(), Some(vec![7; 8]));

        let op = BlockOp::Full {
            output: output([2], DataType::F64),
            value: 1.0f32.to_ne_bytes().into(),
        };
        assert!(full(&op, &[]).is_err());
        Ok(())
    }

    #[test]
    fn test_rand() -> Result<(), Box<dyn Error>> {
        let op = BlockOp::Rand {
            output: output([4, 4], DataType::F64),
            seed: 42,
        };
        let x = rand(&op, &[])?.remove(0).to_vec::<f64>().unwrap_or_default();
        let y = rand(&op, &[])?.remove(0).to_vec::<f64>().unwrap_or_default();
        assert_eq!(x.len(), 16);
        assert_eq!(x, y);
        assert!(x.iter().all(|x| (0.0..1.0).contains(x)));

        let op = BlockOp::Rand {
            output: output([4], DataType::I64),
            seed: 42,
        };
        assert!(rand(&op, &[]).is_err());
        Ok(())
    }

    #[test]
    fn test_eye() -> Result<(), Box<dyn Error>> {
        let op = BlockOp::Eye {
            output: output([2, 2], DataType::F32),
            n: 4,
            coord: [1, 1],
        };
        let block = eye(&op, &[])?.remove(0);
        assert_eq!(block.to_vec::<f32>(), Some(vec![1.0, 0.0, 0.0, 1.0]));

        let op = BlockOp::Eye {
            output: output([2, 2], DataType::F32),
            n: 4,
            coord: [0, 1],
        };
        let block = eye(&op, &[])?.remove(0);
        assert_eq!(block.to_vec::<f32>(), Some(vec![0.0; 4]));
        Ok(())
    }
}
