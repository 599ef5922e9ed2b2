//! Shared types for the Hearth daemon crates.

pub mod backend;
pub mod config;
pub mod error;
pub mod generation;
pub mod message;
pub mod stream;
pub mod trace;
