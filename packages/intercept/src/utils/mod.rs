// packages/intercept/src/utils/mod.rs
//! Shared utilities: configuration and error types

pub mod config;
pub mod errors;
