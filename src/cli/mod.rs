//! Command-line interface module.

mod args;
pub mod build;
pub mod common;
pub mod serve;
pub mod show;

pub use args::{Cli, Commands};
