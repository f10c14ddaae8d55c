use std::sync::{Arc, PoisonError, RwLock};

use derive_more::Display;
use rustc_hash::FxHashMap as HashMap;

use super::Reservation;
use crate::loom::ops::OpKind;

/// A task descriptor specialized for one resource reservation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
#[display("{kind}[{reservation}]")]
pub struct TaskVariant {
    pub kind: OpKind,
    pub reservation: Reservation,
}

/// Lazily populated `(op, reservation) -> variant` table.
///
/// Equal keys always yield the same shared variant.
#[derive(Debug, Default)]
pub struct VariantRegistry {
    variants: RwLock<HashMap<(OpKind, Reservation), Arc<TaskVariant>>>,
}

impl VariantRegistry {
    pub fn get(&self, kind: OpKind, reservation: Reservation) -> Arc<TaskVariant> {
        let key = (kind, reservation);
        if let Some(variant) = self
            .variants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return variant.clone();
        }

        let mut variants = self
            .variants
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        variants
            .entry(key)
            .or_insert_with(|| {
                let variant = TaskVariant { kind, reservation };
                log::debug!("register task variant {variant}");
                Arc::new(variant)
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.variants
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
