use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use lp_shop_app::auth::BearerCredential;

const SESSION_FILE: &str = "session";

/// Credential saved between invocations.
#[derive(Debug, Clone)]
pub(crate) struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub(crate) fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    pub(crate) fn load(&self) -> Result<Option<BearerCredential>, String> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(None),
            Ok(raw) => Ok(Some(BearerCredential::new(raw.trim()))),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(format!(
                "failed to read session {}: {error}",
                self.path.display()
            )),
        }
    }

    pub(crate) fn save(&self, credential: &BearerCredential) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|error| format!("failed to create {}: {error}", parent.display()))?;
        }

        fs::write(&self.path, credential.expose()).map_err(|error| {
            format!("failed to write session {}: {error}", self.path.display())
        })
    }

    pub(crate) fn clear(&self) -> Result<(), String> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(error) => Err(format!(
                "failed to remove session {}: {error}",
                self.path.display()
            )),
        }
    }
}
