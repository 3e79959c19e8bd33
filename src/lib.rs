//! ventwatch - bedside respiratory-support documentation for the ICU.
//!
//! [`engine`] holds the clinical calculations and alert rules as pure
//! functions. [`db`] and [`web`] are the host around it: a SQLite store for
//! sectors, patients and records, and a JSON API over both.

pub mod config;
pub mod db;
pub mod engine;
pub mod web;
