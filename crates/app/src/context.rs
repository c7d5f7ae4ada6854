//! App Context

use std::{path::PathBuf, sync::Arc};

use thiserror::Error;

use crate::{
    auth::{BearerCredential, SessionIdentity},
    domain::carts::{CartStore, HttpCartConfig, HttpCartService},
    storage::{FileSnapshotStore, SnapshotError},
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to open snapshot directory")]
    Snapshots(#[source] SnapshotError),
}

/// Settings needed to wire a cart store to real collaborators.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Base URL of the shop API.
    pub api_url: String,

    /// Directory holding one snapshot file per owner key.
    pub data_dir: PathBuf,

    /// Credential of the signed-in customer, if any.
    pub credential: Option<BearerCredential>,
}

#[derive(Debug, Clone)]
pub struct AppContext {
    pub snapshots: Arc<FileSnapshotStore>,
    pub remote: Arc<HttpCartService>,
    pub identity: Arc<SessionIdentity>,
}

impl AppContext {
    /// Build application context from settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot directory cannot be created.
    pub fn new(settings: AppSettings) -> Result<Self, AppInitError> {
        let snapshots =
            FileSnapshotStore::open(settings.data_dir).map_err(AppInitError::Snapshots)?;

        Ok(Self {
            snapshots: Arc::new(snapshots),
            remote: Arc::new(HttpCartService::new(HttpCartConfig {
                base_url: settings.api_url,
            })),
            identity: Arc::new(SessionIdentity::new(settings.credential)),
        })
    }

    /// A new, uninitialised cart store over this context's collaborators.
    #[must_use]
    pub fn cart_store(&self) -> CartStore {
        CartStore::new(
            self.snapshots.clone(),
            self.remote.clone(),
            self.identity.clone(),
        )
    }
}
