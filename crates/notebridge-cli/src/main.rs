//! notebridge CLI — run the self-healing vault cache over a local vault.
//!
//! Commands: scan, search, tag, cat, watch, completions

mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use notebridge_core::CacheConfig;

#[derive(Parser)]
#[command(name = "notebridge")]
#[command(version)]
#[command(about = "Self-healing metadata and content cache for markdown vaults")]
struct Cli {
    /// Vault directory
    #[arg(long, global = true, default_value = ".")]
    vault: PathBuf,

    /// Log level for stderr output (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(flatten)]
    cache: CacheArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of the `NOTEBRIDGE_*` environment.
#[derive(Args, Debug, Default)]
struct CacheArgs {
    /// Maximum concurrent per-file fetches during a refresh
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Evaluate frontmatter repairs (dry run unless --apply)
    #[arg(long, global = true)]
    repair: bool,

    /// Write repairs back to the vault
    #[arg(long, global = true, requires = "repair")]
    apply: bool,

    /// Maximum repairs applied per refresh
    #[arg(long, global = true)]
    max_repairs: Option<usize>,

    /// Lowercase tags while normalizing
    #[arg(long, global = true)]
    lowercase_tags: bool,
}

impl CacheArgs {
    fn apply_to(&self, config: &mut CacheConfig) {
        if let Some(concurrency) = self.concurrency {
            config.refresh_concurrency = concurrency;
        }
        if self.repair {
            config.repair_enabled = true;
        }
        if self.apply {
            config.repair_dry_run = false;
        }
        if let Some(max) = self.max_repairs {
            config.max_repairs_per_run = max;
        }
        if self.lowercase_tags {
            config.lowercase_tags = true;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the cache once and print stats, issues and (optionally) notes
    Scan {
        /// Include every note's metadata in the output
        #[arg(long)]
        notes: bool,
    },
    /// Search names, tags, paths, frontmatter and note bodies
    #[command(alias = "s")]
    Search {
        query: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Skip note bodies
        #[arg(long)]
        no_content: bool,
    },
    /// List notes carrying a tag
    Tag { tag: String },
    /// Print a note's content through the cache
    Cat { path: String },
    /// Keep the cache warm and follow vault changes, one JSON line per event
    Watch {
        /// Refresh period in minutes
        #[arg(long)]
        interval_mins: Option<u64>,
        /// Exit after this many file events
        #[arg(long)]
        max_events: Option<usize>,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "notebridge", &mut std::io::stdout());
        return Ok(());
    }

    logging::init(&cli.log_level);

    let mut config = CacheConfig::from_env()?;
    cli.cache.apply_to(&mut config);
    if let Commands::Watch {
        interval_mins: Some(mins),
        ..
    } = cli.command
    {
        config.refresh_interval = std::time::Duration::from_secs(mins.saturating_mul(60));
    }
    config.validate()?;

    let ctx = commands::Context::open(&cli.vault, config)?;
    match cli.command {
        Commands::Scan { notes } => commands::scan(&ctx, notes).await,
        Commands::Search {
            query,
            limit,
            no_content,
        } => commands::search(&ctx, &query, limit, !no_content).await,
        Commands::Tag { tag } => commands::tag(&ctx, &tag).await,
        Commands::Cat { path } => commands::cat(&ctx, &path).await,
        Commands::Watch { max_events, .. } => commands::watch(&ctx, max_events).await,
        Commands::Completions { .. } => Ok(()),
    }
}
