//! Input/output helpers.
//!
//! - dataset ingest (`ingest`)
//! - CSV exports of datasets and fits (`export`)
//! - fit record JSON read/write (`record`)

pub mod export;
pub mod ingest;
pub mod record;

pub use export::*;
pub use ingest::*;
pub use record::*;
