use super::Kernel;
use crate::loom::ops::OpKind;

mod fill;
mod index;
mod reduce;
mod svd;
mod tensordot;
mod transpose;

pub use fill::{eye, full, rand};
pub use index::set_value;
pub use reduce::count_nonzero;
pub use svd::{svd, svd_matrix, svd_values};
pub use tensordot::tensordot;
pub use transpose::transpose;

/// Every kernel this backend provides, keyed by the op kind it executes.
pub fn kernels() -> [(OpKind, Kernel); 10] {
    [
        (OpKind::Full, full),
        (OpKind::Rand, rand),
        (OpKind::Eye, eye),
        (OpKind::Transpose, transpose),
        (OpKind::Tensordot, tensordot),
        (OpKind::SetValue, set_value),
        (OpKind::CountNonzero, count_nonzero),
        (OpKind::Svd, svd),
        (OpKind::SvdValues, svd_values),
        (OpKind::SvdMatrix, svd_matrix),
    ]
}
