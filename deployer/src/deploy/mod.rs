//! Deployment module

pub mod fsm;
pub mod hooks;
pub mod manifest;
pub mod provisioner;
pub mod submitter;
pub mod workflow;
