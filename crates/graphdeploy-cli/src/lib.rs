//! Command line front end for graphdeploy.
//!
//! Commands run against the file-backed sandbox provider; the project
//! config, converged state and sandbox ledger all live next to
//! `graphdeploy.toml`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod output;
