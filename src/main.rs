use std::process;

use anyhow::Result;
use clap::Parser;
use structsync::cli::commands::apply::{ApplyCommand, ApplyCommandHandler};
use structsync::cli::commands::diff::{DiffCommand, DiffCommandHandler};
use structsync::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() {
    // CLIをパースして実行
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // 非同期ランタイムを作成して実行
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to create Tokio runtime: {}", e);
            process::exit(1);
        }
    };

    let result = runtime.block_on(run_command(cli));

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// コマンドを実行する
async fn run_command(cli: Cli) -> Result<String> {
    match cli.command {
        Commands::Diff => {
            let handler = DiffCommandHandler::new();
            let command = DiffCommand {
                config_path: cli.config,
                env: cli.env,
            };
            handler.execute(&command).await
        }

        Commands::Apply { dry_run } => {
            let handler = ApplyCommandHandler::new();
            let command = ApplyCommand {
                config_path: cli.config,
                env: cli.env,
                dry_run,
            };
            handler.execute(&command).await
        }
    }
}
