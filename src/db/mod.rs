//! Database module for ventwatch.
//!
//! SQLite storage for sectors, patients, calculator scores and monitoring
//! records, with embedded migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
