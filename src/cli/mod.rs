//! Command-line front end

pub mod commands;
pub mod input;

pub use commands::*;
