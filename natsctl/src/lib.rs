//! Control plane core for decentralized NATS authentication.
//!
//! Mints nkeys/JWTs for operators, accounts and users, keeps them
//! consistent with policy via a reactive hook graph, publishes changes to
//! the live cluster, and exposes observer fan-out primitives for
//! monitoring endpoints.

pub mod bootstrap;
pub mod cli_context;
pub mod config;
pub mod error;
pub mod fanout;
pub mod hooks;
pub mod keys;
pub mod limits;
pub mod observer;
pub mod publish;
pub mod store;

pub use error::{Error, Result};
pub use hooks::HookGraph;
