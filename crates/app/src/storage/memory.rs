//! In-memory snapshot store.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use crate::{
    domain::carts::models::{CartLine, OwnerKey},
    storage::{SnapshotError, SnapshotStore},
};

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<OwnerKey, Vec<CartLine>>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a snapshot, as if saved by an earlier session.
    #[must_use]
    pub fn with_snapshot(self, owner: OwnerKey, lines: Vec<CartLine>) -> Self {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner, lines);

        self
    }

    #[must_use]
    pub fn contains(&self, owner: &OwnerKey) -> bool {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(owner)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, owner: &OwnerKey) -> Result<Option<Vec<CartLine>>, SnapshotError> {
        Ok(self
            .snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner)
            .cloned())
    }

    fn save(&self, owner: &OwnerKey, lines: &[CartLine]) -> Result<(), SnapshotError> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner.clone(), lines.to_vec());

        Ok(())
    }

    fn remove(&self, owner: &OwnerKey) -> Result<(), SnapshotError> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(owner);

        Ok(())
    }
}
