//! orgahome CLI - Main Entry Point
//!
//! Runs the homepage server and manages its content-hashed static assets.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{serve, static_files};

/// orgahome - organisation homepage and machine inventory
#[derive(Parser, Debug)]
#[command(name = "orgahome")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server
    Serve(serve::ServeArgs),

    /// Compile and inspect static assets
    #[command(subcommand)]
    Static(static_files::StaticCommands),

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let runtime = match &cli.command {
        Commands::Serve(args) => tokio::runtime::Builder::new_multi_thread()
            .worker_threads(args.worker_threads())
            .enable_all()
            .build()?,
        _ => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?,
    };

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => serve::execute(args).await?,
        Commands::Static(cmd) => static_files::execute(cmd, cli.format).await?,
        Commands::Version => {
            println!("orgahome v{}", orgahome_common::VERSION);
            println!("Static manifest: {}", orgahome_common::MANIFEST_FILENAME);
        }
    }

    Ok(())
}
