//! Command-line definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// etlflow - metadata-driven dataflow runner
#[derive(Parser)]
#[command(name = "etlflow", about = "Run metadata-driven dataflows with per-record lineage", version)]
pub struct Cli {
    /// Engine settings file (YAML)
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run dataflows from a metadata document
    Run {
        /// Metadata document (.yaml, .yml or .json)
        metadata: PathBuf,

        /// Run only this dataflow; all of them in order otherwise
        #[arg(short, long)]
        dataflow: Option<String>,

        /// SQLite lineage store
        #[arg(long)]
        db: Option<PathBuf>,

        /// Pushgateway base URL to push metrics to after the run
        #[arg(long)]
        pushgateway: Option<String>,

        /// Print lineage events to stdout as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Show recent executions from the lineage store
    History {
        #[arg(long)]
        db: Option<PathBuf>,

        /// Number of executions to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Check a metadata document and print each execution plan
    Validate {
        metadata: PathBuf,
    },

    /// Serve Prometheus metrics on /metrics until Ctrl-C
    ServeMetrics {
        #[arg(long)]
        addr: Option<String>,
    },
}
