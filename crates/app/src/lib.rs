//! LP Shop cart reconciliation, persistence and remote synchronisation.

pub mod auth;
pub mod context;
pub mod domain;
pub mod storage;

#[cfg(test)]
mod test;
