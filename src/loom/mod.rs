//! Block-distributed tensors.
//!
//! ## Key Components
//! 1. **Data Model**:
//!    - `Shape`, `Grid` and `Slice` address blocks by grid coordinate.
//!    - `Block` is a dense in-process array; `BlockHandle` refers to one living on a scheduler.
//!    - `Tensor` ties a grid of handles to a shape, a block shape and a lifecycle scope.
//!
//! 2. **Operations**:
//!    - Every tensor-level operation becomes a set of `BlockOp`s, described by shapes and
//!      types only so they can be priced before they run.
//!    - `contract` maps a tensor contraction onto sums of block-pairwise contractions.
//!    - `network` runs a chain of contractions along an externally decided order.
//!
//! 3. **Numerical System**:
//!    - Scalar types (`f16`, `f32`, `f64`, `i32`, `i64`) and their `DataType` tags.

pub mod array;
pub mod block;
pub mod contract;
pub mod grid;
pub mod network;
pub mod num;
pub mod ops;
pub mod platform;
pub mod shape;
pub mod slice;
pub mod tensor;
