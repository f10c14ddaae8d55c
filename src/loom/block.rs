use std::{borrow::Cow, sync::Arc};

use derive_more::{Display, From, Into};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{
    num::{DataType, Scalar},
    ops::{Access, BlockIr},
    shape::Shape,
};

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into,
    Serialize, Deserialize,
)]
#[display("block#{_0}")]
pub struct BlockId(pub usize);

/// A materialized dense array. The contents are laid out row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    shape: Shape,
    r#type: DataType,
    data: Arc<[u8]>,
}

impl Block {
    /// Wraps raw contents. Returns `None` if the byte count does not match `shape` and `type`.
    pub fn from_bytes(shape: impl Into<Shape>, r#type: DataType, data: Arc<[u8]>) -> Option<Self> {
        let shape = shape.into();
        (shape.size() * r#type.size() == data.len()).then_some(Self {
            shape,
            r#type,
            data,
        })
    }

    /// Creates a block from typed contents. Returns `None` if the count does not match `shape`.
    pub fn from_vec<T: Scalar>(shape: impl Into<Shape>, contents: Vec<T>) -> Option<Self> {
        let data: Arc<[u8]> = bytemuck::cast_slice::<T, u8>(&contents).into();
        Self::from_bytes(shape, T::DATA_TYPE, data)
    }

    /// Creates a block with every element set to `value`.
    pub fn full<T: Scalar>(shape: impl Into<Shape>, value: T) -> Self {
        let shape = shape.into();
        let contents = vec![value; shape.size()];
        let data: Arc<[u8]> = bytemuck::cast_slice::<T, u8>(&contents).into();
        Self {
            shape,
            r#type: T::DATA_TYPE,
            data,
        }
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.r#type
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reads the contents as `T`. Copies only if the buffer is misaligned for `T`.
    ///
    /// Returns `None` if `T` is not the block's data type.
    pub fn read_slice<T: Scalar>(&self) -> Option<Cow<'_, [T]>> {
        if T::DATA_TYPE != self.r#type {
            return None;
        }
        let slice = match bytemuck::try_cast_slice(self.bytes()) {
            Ok(slice) => Cow::Borrowed(slice),
            Err(_) => Cow::Owned(bytemuck::pod_collect_to_vec(self.bytes())),
        };
        Some(slice)
    }

    /// Reads one element.
    pub fn read<T: Scalar>(&self, index: &[usize]) -> Option<T> {
        let offset = self.shape.offset(index)?;
        self.read_slice::<T>().map(|slice| slice[offset])
    }

    /// Collects the contents into owned values.
    pub fn to_vec<T: Scalar>(&self) -> Option<Vec<T>> {
        self.read_slice::<T>().map(Cow::into_owned)
    }
}

/// An exclusively owned reference to a block living on the scheduler.
///
/// Handles are not `Clone`: a block belongs to exactly one grid cell of one tensor.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct BlockHandle {
    id: BlockId,
    shape: Shape,
    r#type: DataType,
}

impl BlockHandle {
    #[inline]
    pub(crate) fn new(id: BlockId, shape: Shape, r#type: DataType) -> Self {
        Self { id, shape, r#type }
    }

    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.r#type
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.shape.size() * self.r#type.size()
    }

    #[inline]
    pub fn ir(&self, access: Access) -> BlockIr {
        BlockIr {
            shape: self.shape.clone(),
            r#type: self.r#type,
            id: self.id,
            access,
        }
    }

    /// Permutes the recorded shape after a transpose task has been submitted for this block.
    pub(crate) fn permute(&mut self, axes: &[usize]) {
        self.shape = self.shape.permute(axes);
    }
}

impl std::fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<{}; {}>", self.id, self.r#type, self.shape)
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = crate::dispatch_type!(self.r#type, T => self
            .read_slice::<T>()
            .map(|slice| slice.iter().map(|x| format!("{x:?}")).join(", "))
            .unwrap_or_default());
        write!(f, "Block<{}; {}>[{values}]", self.r#type, self.shape)
    }
}

#[cfg(test)]
mod tests {
    use super::Block;
    use crate::loom::num::DataType;

    #[test]
    fn test_block_access() {
        let block = Block::from_vec([2, 2], vec![1.0f32, 2.0, 3.0, 4.0]).expect("contents must match");
        assert_eq!(block.data_type(), DataType::F32);
        assert_eq!(block.data_size(), 16);
        assert_eq!(block.read::<f32>(&[1, 0]), Some(3.0));
        assert_eq!(block.read::<f64>(&[1, 0]), None);
        assert_eq!(block.read::<f32>(&[2, 0]), None);
        assert!(Block::from_vec([3], vec![1i64, 2]).is_none());
        assert_eq!(Block::full([3], 7i32).to_vec::<i32>(), Some(vec![7, 7, 7]));
    }
}
