//! Core types and trait definitions for the Courier messaging backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod account;
pub mod chat;
pub mod codec;
pub mod error;
pub mod store;

pub use error::{Error, Result};
