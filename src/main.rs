use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use deploy_manifest::revision::RevisionSource;

mod cmd;

#[derive(Parser)]
#[command(name = "deploy-manifest")]
#[command(version, about = "Upload, list, and activate deployment revisions")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Project name used as the manifest key prefix. Overrides deploy.toml.
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Build output directory holding the artifact. Overrides deploy.toml.
    #[arg(long, global = true)]
    pub dist_dir: Option<PathBuf>,

    /// Table storage connection string. Overrides env and deploy.toml.
    #[arg(long, global = true)]
    pub connection_string: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List uploaded revisions, most recent first
    List {
        /// Maximum number of revisions to display
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Print the full listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the active revision key
    Current,
    /// Upload the build artifact as a new revision
    Upload {
        /// Revision token to use instead of the revision hash
        #[arg(short, long)]
        revision: Option<String>,

        /// Revision hash supplied by the pipeline (first 8 characters are used)
        #[arg(long)]
        revision_key: Option<String>,

        /// Where to derive the revision hash from when none is given: content, git
        #[arg(long, default_value = "content")]
        revision_source: RevisionSource,

        /// Activate the revision after uploading it
        #[arg(long)]
        activate: bool,
    },
    /// Point the current revision at an uploaded revision
    Activate {
        /// Revision token to activate
        #[arg(short, long)]
        revision: Option<String>,

        /// Revision hash whose first 8 characters name the revision
        #[arg(long)]
        revision_key: Option<String>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default deploy.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("deploy_manifest=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::List { limit, json } => cmd::cmd_list(&cli, &project_dir, *limit, *json).await?,
        Commands::Current => cmd::cmd_current(&cli, &project_dir).await?,
        Commands::Upload {
            revision,
            revision_key,
            revision_source,
            activate,
        } => {
            cmd::cmd_upload(
                &cli,
                &project_dir,
                revision.clone(),
                revision_key.clone(),
                *revision_source,
                *activate,
            )
            .await?
        }
        Commands::Activate {
            revision,
            revision_key,
        } => cmd::cmd_activate(&cli, &project_dir, revision.clone(), revision_key.clone()).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
