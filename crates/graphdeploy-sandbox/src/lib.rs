//! # graphdeploy-sandbox
//!
//! A local provider for graphdeploy. [`SandboxClient`] implements
//! [`ResourceClient`](graphdeploy_core::ResourceClient) against an in-memory
//! [`Ledger`] with the same update-in-place and idempotent-remove semantics
//! as a real provider, and optionally writes the ledger to a JSON file so
//! that state survives between runs.

mod client;
mod error;
pub mod ledger;

pub use client::SandboxClient;
pub use error::SandboxError;
pub use ledger::Ledger;
