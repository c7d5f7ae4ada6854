//! Cart synchronisation errors.

use thiserror::Error;

/// Errors raised while mirroring the cart to the remote cart service.
#[derive(Debug, Error)]
pub enum CartSyncError {
    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cart service returned a non-2xx response.
    #[error("unexpected response from cart service: {0}")]
    UnexpectedResponse(String),

    /// The background sync task is no longer running.
    #[error("cart sync task stopped")]
    WorkerStopped,
}
