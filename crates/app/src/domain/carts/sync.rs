//! Background mirroring of local cart mutations to the remote cart service.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{Instrument, debug, info_span, warn};

use crate::{
    auth::BearerCredential,
    domain::carts::{
        errors::CartSyncError,
        records::{RemoteCartItem, RemoteLineKey, RemoteQuantityUpdate},
        remote::RemoteCartService,
    },
};

/// One remote side effect, with the credential captured when it was queued.
#[derive(Debug)]
pub(crate) enum SyncOp {
    Upsert {
        credential: BearerCredential,
        item: RemoteCartItem,
    },
    Remove {
        credential: BearerCredential,
        key: RemoteLineKey,
    },
    Update {
        credential: BearerCredential,
        update: RemoteQuantityUpdate,
    },
    Clear {
        credential: BearerCredential,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
}

impl SyncOp {
    const fn name(&self) -> &'static str {
        match self {
            Self::Upsert { .. } => "add_to_cart",
            Self::Remove { .. } => "remove_from_cart",
            Self::Update { .. } => "update_cart_item",
            Self::Clear { .. } => "clear_cart",
            Self::Flush { .. } => "flush",
        }
    }
}

/// Handle to the sync task. Operations run one at a time in queue order.
#[derive(Debug, Clone)]
pub(crate) struct SyncQueue {
    sender: mpsc::UnboundedSender<SyncOp>,
}

impl SyncQueue {
    /// Spawn the sync task on the current runtime.
    pub(crate) fn spawn(remote: Arc<dyn RemoteCartService>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(run(remote, receiver).instrument(info_span!("cart_sync")));

        Self { sender }
    }

    /// Queue an operation without waiting for it.
    pub(crate) fn submit(&self, op: SyncOp) {
        if let Err(mpsc::error::SendError(op)) = self.sender.send(op) {
            warn!(
                op = op.name(),
                error = %CartSyncError::WorkerStopped,
                "dropping cart sync operation"
            );
        }
    }

    /// Wait until every operation queued so far has been attempted.
    pub(crate) async fn flush(&self) {
        let (done, finished) = oneshot::channel();

        self.submit(SyncOp::Flush { done });

        if finished.await.is_err() {
            warn!(error = %CartSyncError::WorkerStopped, "cart sync flush abandoned");
        }
    }
}

async fn run(remote: Arc<dyn RemoteCartService>, mut receiver: mpsc::UnboundedReceiver<SyncOp>) {
    while let Some(op) = receiver.recv().await {
        let name = op.name();

        let result = match op {
            SyncOp::Upsert { credential, item } => remote.add_to_cart(&credential, &item).await,
            SyncOp::Remove { credential, key } => {
                remote.remove_from_cart(&credential, &key).await
            }
            SyncOp::Update { credential, update } => {
                remote.update_cart_item(&credential, &update).await
            }
            SyncOp::Clear { credential } => remote.clear_cart(&credential).await,
            SyncOp::Flush { done } => {
                // The flusher may have given up waiting.
                if done.send(()).is_err() {
                    debug!("flush receiver dropped");
                }

                continue;
            }
        };

        match result {
            Ok(()) => debug!(op = name, "cart synced"),
            Err(error) => warn!(op = name, %error, "cart sync failed"),
        }
    }

    debug!("cart sync queue closed");
}
