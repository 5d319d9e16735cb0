//! Command-line front end for [`hdetect`].
//!
//! The binary `hd` is a thin wrapper over [`cli::run`]; keeping the logic in
//! a library lets tests drive it with in-memory writers.

pub mod cli;
pub mod logging;

pub use cli::{Cli, run};
