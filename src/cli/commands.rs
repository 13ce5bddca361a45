//! CLI commands and argument parsing

use crate::engine::OrderedFetchOptions;
use crate::query::SortOrder;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Batched, resumable listing over a REST entity collection
#[derive(Parser, Debug)]
#[command(name = "entity-pager")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Client configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Checkpoint file (JSON)
    #[arg(short, long, global = true)]
    pub state_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a listing and print its entities
    List {
        /// Resource path (e.g. database/12/profiles)
        resource: String,

        /// Page size (defaults to paging.page_size from the config)
        #[arg(long)]
        limit: Option<i64>,

        /// Field to order by
        #[arg(long)]
        orderby: Option<String>,

        /// Sort direction (asc or desc)
        #[arg(long)]
        order: Option<SortOrder>,

        /// Filter expression such as `age>30` (repeatable)
        #[arg(long = "field")]
        fields: Vec<String>,

        /// Ask the store for a total count
        #[arg(long)]
        total: bool,

        #[command(flatten)]
        walk: WalkArgs,

        #[command(flatten)]
        checkpoint: CheckpointArgs,
    },

    /// Continue a walk stored in the checkpoint file
    Resume {
        /// Checkpoint name
        name: String,

        /// Filter expressions of a checkpoint stored without filter values
        #[arg(long = "field")]
        fields: Vec<String>,

        #[command(flatten)]
        walk: WalkArgs,

        /// Keep the checkpoint as it was instead of updating it
        #[arg(long)]
        no_update: bool,
    },

    /// List stored checkpoints
    Checkpoints,
}

/// How to continue a walk
#[derive(Args, Debug, Clone, Copy)]
pub struct WalkArgs {
    /// Continue by order-field value instead of offset
    #[arg(long)]
    pub ordered: bool,

    /// Treat the order field as holding unique values
    #[arg(long, requires = "ordered")]
    pub unique: bool,

    /// Fall back to offset paging on an ambiguous boundary
    #[arg(long, requires = "ordered")]
    pub fallback: bool,

    /// Maximum number of pages to fetch (0 = until exhausted)
    #[arg(long, default_value = "0")]
    pub pages: usize,
}

impl WalkArgs {
    /// Options for ordered continuation calls
    pub fn options(&self) -> OrderedFetchOptions {
        let options = OrderedFetchOptions::new().fall_back_to_unordered(self.fallback);
        if self.unique {
            options.unique(true)
        } else {
            options
        }
    }
}

/// Where and how to store the walk when done
#[derive(Args, Debug, Clone, Default)]
pub struct CheckpointArgs {
    /// Store the walk under this name
    #[arg(long)]
    pub checkpoint: Option<String>,

    /// Leave the last batch of entities out of the checkpoint
    #[arg(long, requires = "checkpoint")]
    pub without_entities: bool,

    /// Leave filter values out of the checkpoint
    #[arg(long, requires = "checkpoint")]
    pub without_filter_values: bool,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
