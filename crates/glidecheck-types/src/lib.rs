//! Shared domain types for the glidecheck project.

pub mod config;
pub mod events;
pub mod report;
pub mod vision;

mod errors;

pub use errors::{GlideError, Result};
