//! Rescene - Rebuild scene RAR volumes and media samples
//!
//! This library crate exposes the core functionality for integration testing.

pub mod commands;
pub mod config;
