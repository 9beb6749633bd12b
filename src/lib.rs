//! Reconciliation and provisioning engine for a tool-server management
//! runtime: keeps group client rosters in sync, provisions secrets under
//! collision-free keys and clones workloads with conflict retry.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod naming;
pub mod roster;
pub mod secrets;
pub mod workloads;

pub use error::{Error, Result};
