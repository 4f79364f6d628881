//! pgprobe - PostgreSQL connectivity checker.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod network;
pub mod output;
pub mod runner;
pub mod target;
