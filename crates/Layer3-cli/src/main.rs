//! gmp CLI - Main entry point

mod cache;
mod tools;

use clap::{Parser, Subcommand};
use gmp_foundation::{Namespace, Settings};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// gmp - tool-provider cache for the Gradio MCP playground
#[derive(Parser, Debug)]
#[command(name = "gmp")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Cache directory (overrides settings and GMP_CACHE_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Cache entry lifetime in seconds
    #[arg(long, global = true, value_name = "SECS")]
    ttl_secs: Option<u64>,

    /// Bypass the cache for this run
    #[arg(long, global = true)]
    no_cache: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect and manage the cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// Acquire every configured provider and list its tools
    Tools {
        /// Providers file (mcpServers JSON, YAML or TOML)
        #[arg(long, value_name = "FILE")]
        servers: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// Show cache statistics
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Remove cache entries
    Clear {
        /// Cache type: provider (servers, mcp), config (configs), model (models)
        #[arg(long = "type", value_name = "TYPE")]
        cache_type: Option<Namespace>,

        /// Single entry identifier (provider name or config file path)
        #[arg(long, value_name = "ID", requires = "cache_type")]
        id: Option<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
    },
    /// Invalidate cached provider tools, optionally re-acquiring them
    Refresh {
        /// Provider name (all providers when omitted)
        name: Option<String>,

        /// Providers file; when given, providers are re-acquired immediately
        #[arg(long, value_name = "FILE")]
        servers: Option<PathBuf>,
    },
    /// Delete expired entries
    Prune,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging (stderr, RUST_LOG 우선)
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let settings = resolve_settings(&args)?;

    match args.command {
        Command::Cache { action } => match action {
            CacheCommand::Status { json } => cache::status(&settings, json),
            CacheCommand::Clear {
                cache_type,
                id,
                force,
            } => cache::clear(&settings, cache_type, id.as_deref(), force),
            CacheCommand::Refresh { name, servers } => {
                cache::refresh(&settings, name.as_deref(), servers.as_deref()).await
            }
            CacheCommand::Prune => cache::prune(&settings),
        },
        Command::Tools { servers, json } => tools::list(&settings, servers.as_deref(), json).await,
    }
}

/// settings.toml → 환경 변수 → CLI 플래그 순으로 적용
fn resolve_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = Settings::load()?;

    if let Some(dir) = &args.cache_dir {
        settings = settings.with_cache_dir(dir);
    }
    if let Some(secs) = args.ttl_secs {
        settings = settings.with_ttl_secs(secs);
    }
    if args.no_cache {
        settings = settings.without_cache();
    }

    debug!(
        "Cache: {} (enabled: {}, ttl: {}s)",
        settings.cache_dir().display(),
        settings.cache.enabled,
        settings.cache.ttl_secs
    );
    Ok(settings)
}

/// 0 성공, 1 실패, 2 잘못된 인자
fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<gmp_foundation::Error>() {
        Some(e) if e.is_user_facing() => 2,
        _ => 1,
    }
}
