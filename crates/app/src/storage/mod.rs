//! Durable cart snapshots, one per owner key.

use mockall::automock;
use thiserror::Error;

use crate::domain::carts::models::{CartLine, OwnerKey};

mod file;
mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not a valid cart line list")]
    Malformed(#[source] serde_json::Error),

    #[error("snapshot could not be encoded")]
    Encode(#[source] serde_json::Error),
}

/// Last-write-wins snapshot storage keyed by owner key.
#[automock]
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot for `owner`; `None` when nothing was ever saved.
    fn load(&self, owner: &OwnerKey) -> Result<Option<Vec<CartLine>>, SnapshotError>;

    /// Overwrite the snapshot for `owner`.
    fn save(&self, owner: &OwnerKey, lines: &[CartLine]) -> Result<(), SnapshotError>;

    /// Delete the snapshot for `owner`. Deleting a missing snapshot succeeds.
    fn remove(&self, owner: &OwnerKey) -> Result<(), SnapshotError>;
}
