//! Authentication

mod credential;
mod identity;

pub use credential::*;
pub use identity::*;
