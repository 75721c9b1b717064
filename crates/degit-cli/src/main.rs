//! degit - scaffold a directory from a remote repository
//!
//! Usage:
//!   degit owner/repo                    # GitHub, default branch, into ./repo
//!   degit gitlab:group/project#v2 app   # GitLab tag into ./app
//!   degit owner/repo/templates/web -f   # subdirectory, into a non-empty dir
//!   degit --mode git git@host:me/x.git  # shallow clone instead of snapshot

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use degit_core::prelude::*;

#[derive(Parser)]
#[command(name = "degit", version)]
#[command(about = "Straightforward project scaffolding", long_about = None)]
struct Cli {
    /// Source specifier (owner/repo, github:owner/repo#ref, https://..., git@...)
    src: String,

    /// Destination directory (defaults to the repository name)
    dest: Option<PathBuf>,

    /// Allow writing into a non-empty destination
    #[arg(short, long)]
    force: bool,

    /// Log retrieval and action details
    #[arg(short, long)]
    verbose: bool,

    /// Retrieval mode (tar snapshot or shallow git clone)
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// HTTP(S) proxy for downloads and clones
    #[arg(long, env = "HTTPS_PROXY")]
    proxy: Option<String>,

    /// Ignore cached snapshots and download again
    #[arg(long)]
    refresh: bool,

    /// Snapshot cache directory
    #[arg(long, env = "DEGIT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Download a snapshot archive
    Tar,
    /// Shallow-clone with git
    Git,
}

impl From<ModeArg> for RetrievalMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Tar => RetrievalMode::Snapshot,
            ModeArg::Git => RetrievalMode::Git,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "degit=debug" } else { "degit=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let options = build_options(&cli);
    let degit = Degit::new(&cli.src, options)
        .with_context(|| format!("Failed to prepare source '{}'", cli.src))?;

    let dest = cli
        .dest
        .clone()
        .unwrap_or_else(|| PathBuf::from(degit.descriptor().default_dest_name()));

    let outcome = degit
        .clone(&dest)
        .await
        .with_context(|| format!("Failed to scaffold {} into {}", cli.src, dest.display()))?;

    let origin = if outcome.cache_hit { " (cached)" } else { "" };
    println!(
        "cloned {} to {}{}",
        outcome.descriptor,
        outcome.dest.display(),
        origin
    );
    Ok(())
}

fn build_options(cli: &Cli) -> DegitOptions {
    let options = match &cli.cache_dir {
        Some(dir) => DegitOptions::with_cache_root(dir.clone()),
        None => DegitOptions::new(),
    };
    options
        .with_force(cli.force)
        .with_mode(cli.mode.map(Into::into))
        .with_proxy(cli.proxy.clone())
        .with_refresh(cli.refresh)
}
