//! Carts

pub mod errors;
pub mod lines;
pub mod models;
pub mod records;
pub mod remote;
mod store;
mod sync;

pub use errors::CartSyncError;
pub use remote::*;
pub use store::CartStore;
