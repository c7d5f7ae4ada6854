//! Directory-backed snapshot store.

use std::{fs, io::ErrorKind, path::PathBuf};

use tracing::debug;

use crate::{
    domain::carts::models::{CartLine, OwnerKey},
    storage::{SnapshotError, SnapshotStore},
};

const FILE_PREFIX: &str = "cart.";
const FILE_SUFFIX: &str = ".json";

/// Stores each owner's snapshot as a JSON array in its own file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open (creating when missing) a snapshot directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SnapshotError> {
        let dir = dir.into();

        fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    /// Path of the snapshot file for `owner`.
    #[must_use]
    pub fn path_for(&self, owner: &OwnerKey) -> PathBuf {
        self.dir.join(file_name(owner))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, owner: &OwnerKey) -> Result<Option<Vec<CartLine>>, SnapshotError> {
        let raw = match fs::read(self.path_for(owner)) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(SnapshotError::Malformed)
    }

    fn save(&self, owner: &OwnerKey, lines: &[CartLine]) -> Result<(), SnapshotError> {
        let encoded = serde_json::to_vec(lines).map_err(SnapshotError::Encode)?;
        let path = self.path_for(owner);
        let staging = path.with_extension("json.tmp");

        fs::write(&staging, encoded)?;
        fs::rename(&staging, &path)?;

        debug!(%owner, lines = lines.len(), path = %path.display(), "snapshot written");

        Ok(())
    }

    fn remove(&self, owner: &OwnerKey) -> Result<(), SnapshotError> {
        match fs::remove_file(self.path_for(owner)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// `cart.guest.json`, `cart.user_<subject>.json`; bytes outside
/// `[A-Za-z0-9_-]` in the subject are written as `%XX`.
fn file_name(owner: &OwnerKey) -> String {
    let mut name = String::from(FILE_PREFIX);

    match owner {
        OwnerKey::Guest => name.push_str(OwnerKey::GUEST),
        OwnerKey::User(subject) => {
            name.push_str("user_");

            for byte in subject.bytes() {
                if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                    name.push(char::from(byte));
                } else {
                    name.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }

    name.push_str(FILE_SUFFIX);
    name
}
