// CLIレイヤー
// ユーザー入力の受付とコマンドルーティング

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// structsync - PostgreSQL structure migration tool
///
/// Compares two PostgreSQL databases structurally and converges the
/// target database to the source structure with dependency-ordered DDL.
#[derive(Parser, Debug)]
#[command(name = "structsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "PostgreSQL structure diff and migration tool")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE", default_value = "structsync.yaml")]
    pub config: PathBuf,

    /// Target environment name
    #[arg(short, long, global = true, default_value = "default")]
    pub env: String,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the structural differences between source and target
    ///
    /// Loads both catalogs, computes the typed change set and prints
    /// the ordered migration plan without touching the target.
    Diff,

    /// Apply the migration plan to the target database
    ///
    /// Statements are applied sequentially. On failure the run stops
    /// immediately and reports the last applied statement.
    Apply {
        /// Print the plan without executing it
        #[arg(long)]
        dry_run: bool,
    },
}
