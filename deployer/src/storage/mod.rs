//! Project state storage

pub mod postgres;
pub mod state_store;
