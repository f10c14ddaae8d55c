use std::sync::Arc;

use half::f16;
use itertools::Itertools;

use crate::{
    hal::{KernelError, check_arity},
    loom::{
        block::Block,
        num::{DataType, Float},
        ops::{BlockIr, BlockOp},
        shape::Shape,
    },
};

const MAX_SWEEPS: usize = 64;
const EPSILON: f64 = 1e-15;

/// Thin factors of an `m × n` matrix with `k = min(m, n)`, all row-major.
#[derive(Debug, Clone)]
struct Factors {
    u: Vec<f64>,
    s: Vec<f64>,
    vt: Vec<f64>,
    shape: [usize; 2],
}

impl Factors {
    fn rank(&self) -> usize {
        self.shape[0].min(self.shape[1])
    }

    /// `u · diag(s)`.
    fn us(&self) -> Vec<f64> {
        let k = self.rank();
        self.u
            .chunks(k.max(1))
            .flat_map(|row| row.iter().zip_eq(&self.s).map(|(x, s)| x * s))
            .collect()
    }
}

fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip_eq(y).map(|(x, y)| x * y).sum()
}

/// Applies the plane rotation `(c, s)` to columns `p < q`.
fn rotate(columns: &mut [Vec<f64>], [p, q]: [usize; 2], [c, s]: [f64; 2]) {
    let (left, right) = columns.split_at_mut(q);
    for (x, y) in left[p].iter_mut().zip_eq(right[0].iter_mut()) {
        let (xp, xq) = (*x, *y);
        *x = c * xp - s * xq;
        *y = s * xp + c * xq;
    }
}

/// One-sided Jacobi on the columns of a tall matrix.
///
/// Returns the normalized left singular columns, the singular values and the right singular
/// columns, unsorted.
fn jacobi(mut u: Vec<Vec<f64>>) -> (Vec<Vec<f64>>, Vec<f64>, Vec<Vec<f64>>) {
    let n = u.len();
    let mut v = (0..n)
        .map(|j| (0..n).map(|i| if i == j { 1.0 } else { 0.0 }).collect_vec())
        .collect_vec();

    for _ in 0..MAX_SWEEPS {
        let mut rotated = false;
        for (p, q) in (0..n).tuple_combinations() {
            let alpha = dot(&u[p], &u[p]);
            let beta = dot(&u[q], &u[q]);
            let gamma = dot(&u[p], &u[q]);
            if gamma.abs() <= EPSILON * (alpha * beta).sqrt() {
                continue;
            }
            rotated = true;

            let zeta = (beta - alpha) / (2.0 * gamma);
            let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
            let c = 1.0 / (1.0 + t * t).sqrt();
            rotate(&mut u, [p, q], [c, c * t]);
            rotate(&mut v, [p, q], [c, c * t]);
        }
        if !rotated {
            break;
        }
    }

    let s = u.iter().map(|column| dot(column, column).sqrt()).collect_vec();
    for (column, &sigma) in u.iter_mut().zip_eq(&s) {
        if sigma > 0.0 {
            column.iter_mut().for_each(|x| *x /= sigma);
        }
    }
    (u, s, v)
}

/// Decomposes a row-major `m × n` matrix, with singular values in descending order.
fn decompose(a: &[f64], [m, n]: [usize; 2]) -> Factors {
    // wide matrices are decomposed through their transpose
    let transposed = m < n;
    let columns: Vec<Vec<f64>> = match transposed {
        false => (0..n).map(|j| (0..m).map(|i| a[i * n + j]).collect()).collect(),
        true => a.chunks(n).map(<[f64]>::to_vec).collect(),
    };
    let (left, s, right) = jacobi(columns);
    let (left, right) = match transposed {
        false => (left, right),
        true => (right, left),
    };

    let order = (0..s.len()).sorted_by(|&x, &y| s[y].total_cmp(&s[x])).collect_vec();
    let u = (0..m)
        .flat_map(|i| order.iter().map(|&j| left[j][i]).collect_vec())
        .collect();
    let vt = order.iter().flat_map(|&j| right[j].iter().copied()).collect();
    let s = order.iter().map(|&j| s[j]).collect();
    Factors {
        u,
        s,
        vt,
        shape: [m, n],
    }
}

fn widen<T: Float>(block: &Block) -> Option<Vec<f64>> {
    block
        .read_slice::<T>()
        .map(|x| x.iter().map(|&x| x.to_f64()).collect())
}

fn narrow<T: Float>(data: &[f64]) -> Vec<u8> {
    let contents = data.iter().map(|&x| T::from_f64(x)).collect_vec();
    bytemuck::cast_slice::<T, u8>(&contents).to_vec()
}

fn factorize(block: &Block) -> Result<Factors, KernelError> {
    let shape = block.shape();
    if shape.len() != 2 {
        return Err(KernelError::Axes(vec![0, 1], shape.clone()));
    }
    let data = match block.data_type() {
        DataType::F16 => widen::<f16>(block),
        DataType::F32 => widen::<f32>(block),
        DataType::F64 => widen::<f64>(block),
        r#type => return Err(KernelError::Unsupported(r#type)),
    };
    let data = data.ok_or(KernelError::Value(block.data_size(), block.data_type()))?;
    Ok(decompose(&data, [shape[0], shape[1]]))
}

/// Writes one factor into the output it was planned for.
fn emit(
    output: &BlockIr,
    expected: Shape,
    r#type: DataType,
    data: &[f64],
) -> Result<Block, KernelError> {
    if output.shape != expected {
        return Err(KernelError::Shape(expected, output.shape.clone()));
    }
    if output.r#type != r#type {
        return Err(KernelError::Type(r#type, output.r#type));
    }
    let data = match r#type {
        DataType::F16 => narrow::<f16>(data),
        DataType::F32 => narrow::<f32>(data),
        DataType::F64 => narrow::<f64>(data),
        r#type => return Err(KernelError::Unsupported(r#type)),
    };
    let len = data.len();
    Block::from_bytes(expected, r#type, data.into()).ok_or(KernelError::Value(len, r#type))
}

/// Thin decomposition `input = u · diag(s) · vt` of a matrix block.
pub fn svd(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::Svd { u, s, vt, .. } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 1)?;

    let r#type = inputs[0].data_type();
    let factors = factorize(&inputs[0])?;
    let ([m, n], k) = (factors.shape, factors.rank());
    Ok(vec![
        emit(u, [m, k].into(), r#type, &factors.u)?,
        emit(s, [k].into(), r#type, &factors.s)?,
        emit(vt, [k, n].into(), r#type, &factors.vt)?,
    ])
}

pub fn svd_values(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::SvdValues { s, .. } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 1)?;

    let r#type = inputs[0].data_type();
    let factors = factorize(&inputs[0])?;
    Ok(vec![emit(s, [factors.rank()].into(), r#type, &factors.s)?])
}

/// Like [`svd`], with the singular values folded into the left factor.
pub fn svd_matrix(op: &BlockOp, inputs: &[Arc<Block>]) -> Result<Vec<Block>, KernelError> {
    let BlockOp::SvdMatrix { us, vt, .. } = op else {
        return Err(KernelError::Op(op.kind()));
    };
    check_arity(inputs, 1)?;

    let r#type = inputs[0].data_type();
    let factors = factorize(&inputs[0])?;
    let ([m, n], k) = (factors.shape, factors.rank());
    Ok(vec![
        emit(us, [m, k].into(), r#type, &factors.us())?,
        emit(vt, [k, n].into(), r#type, &factors.vt)?,
    ])
}
