//! `sas-curves` library crate.
//!
//! The binary (`sas`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - datasets, masks and the fit harness are reusable from other tools
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod mask;
pub mod math;
pub mod models;
pub mod report;
