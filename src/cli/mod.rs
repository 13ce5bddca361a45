//! CLI module
//!
//! Command-line interface for walking listings.
//!
//! # Commands
//!
//! - `list` - Start a listing and print its entities
//! - `resume` - Continue a walk stored in the checkpoint file
//! - `checkpoints` - List stored checkpoints

mod commands;
mod runner;

pub use commands::{CheckpointArgs, Cli, Commands, OutputFormat, WalkArgs};
pub use runner::Runner;
