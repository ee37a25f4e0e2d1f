//! Kiln CLI - static site build tool with a live-reloading dev server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kiln_build::Task;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Static site build tool with a live-reloading dev server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter project in the current directory
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },

    /// Clean, build, serve with live reload, and rebuild on change
    #[command(alias = "default")]
    Dev {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Clean and build the whole site once
    Build {
        /// Output directory (defaults to config or "dest")
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip CSS minification
        #[arg(long)]
        no_minify: bool,
    },

    /// Run named tasks in order: clean, clean-html, clean-images,
    /// render-templates, compile-styles, copy-scripts, minify-images,
    /// webp-images
    Run {
        /// Tasks to run
        #[arg(required = true, value_parser = parse_task)]
        tasks: Vec<Task>,
    },

    /// Preview built output without live reload
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to the configured output)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

fn parse_task(name: &str) -> Result<Task, String> {
    name.parse::<Task>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    // Execute command
    match cli.command {
        Commands::Init { yes } => {
            commands::init::run(yes).await?;
        }
        Commands::Dev { port, no_open } => {
            let file = config::load_config(&cli.config)?;
            let open = if no_open { Some(false) } else { None };
            commands::dev::run(&file, port, open).await?;
        }
        Commands::Build { output, no_minify } => {
            let file = config::load_config(&cli.config)?;
            let minify = if no_minify { Some(false) } else { None };
            commands::build::run(&file, output, minify).await?;
        }
        Commands::Run { tasks } => {
            let file = config::load_config(&cli.config)?;
            commands::run::run(&file, tasks).await?;
        }
        Commands::Serve { port, dir } => {
            let file = config::load_config(&cli.config)?;
            let mut server = file.server_config(Some(port), None);
            if let Some(dir) = dir {
                server.root = dir;
            }
            commands::serve::run(server).await?;
        }
    }

    Ok(())
}
