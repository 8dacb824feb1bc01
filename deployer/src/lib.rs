//! Project Deployer Library
//!
//! Provisions and decommissions per-project tenant environments by running
//! them as Kubernetes jobs, recording their outcome and alerting operators.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod logs;
pub mod notify;
pub mod storage;
pub mod utils;
