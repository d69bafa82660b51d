//! Strata CLI - strata command

use anyhow::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use cli_lib::cmd;
use cli_lib::cmd::backup::BackupOptions;
use cli_lib::cmd::incremental::IncrementalOptions;
use std::path::PathBuf;
use strata_changes::IncludeOptions;
use strata_journal::{SnapshotFilter, SnapshotMetadata};
use tracing_subscriber::EnvFilter;

/// Strata - incremental snapshots for a content-addressed backup repository
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Repository location (defaults to the current directory)
    #[arg(short, long, global = true, env = "STRATA_REPOSITORY")]
    repo: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Selects the snapshot to work from
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Only consider snapshots from this host (can be repeated)
    #[arg(long = "host", value_name = "HOST")]
    hosts: Vec<String>,

    /// Only consider snapshots with these comma-separated tags (can be repeated)
    #[arg(long = "tag", value_name = "TAGS")]
    tags: Vec<String>,

    /// Only consider snapshots containing this path (can be repeated)
    #[arg(long = "path", value_name = "PATH")]
    paths: Vec<String>,
}

impl From<FilterArgs> for SnapshotFilter {
    fn from(args: FilterArgs) -> Self {
        SnapshotFilter {
            hosts: args.hosts,
            tags: args.tags,
            paths: args.paths,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a repository
    Init,
    /// Back up paths into a new snapshot
    Backup {
        /// Files and directories to back up
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Tag for the snapshot (can be repeated)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Hostname to record
        #[arg(long)]
        host: Option<String>,
    },
    /// Update the latest snapshot with a list of changed paths
    Incremental {
        /// Changed path (can be repeated)
        #[arg(short = 'i', long = "include", value_name = "PATH")]
        includes: Vec<String>,

        /// Changed path, case-insensitive pattern (can be repeated)
        #[arg(long = "iinclude", value_name = "PATH")]
        insensitive_includes: Vec<String>,

        /// Read changed paths from a file, one per line (can be repeated)
        #[arg(long = "include-file", value_name = "FILE")]
        include_files: Vec<PathBuf>,

        /// Read case-insensitive changed paths from a file (can be repeated)
        #[arg(long = "iinclude-file", value_name = "FILE")]
        insensitive_include_files: Vec<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Hostname to record in the new snapshot
        #[arg(long = "set-host", value_name = "HOST")]
        set_host: Option<String>,

        /// Time to record in the new snapshot ("2024-01-03 14:30:00" or RFC 3339)
        #[arg(long, value_parser = parse_time)]
        time: Option<DateTime<Utc>>,
    },
    /// List snapshots
    Snapshots {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// List the files in a snapshot
    Ls {
        /// Snapshot id, unique id prefix, or "latest"
        #[arg(default_value = "latest")]
        snapshot: String,

        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Remove a snapshot from the journal
    Forget {
        /// Snapshot id or unique id prefix
        snapshot: String,
    },
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(time) = DateTime::parse_from_rfc3339(value) {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid time {:?}: {}", value, e))
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let repo_root = cli_lib::util::repo_path(cli.repo)?;

    match cli.command {
        Commands::Init => cmd::init::run(repo_root).await,
        Commands::Backup { paths, tags, host } => {
            cmd::backup::run(repo_root, BackupOptions { paths, tags, host }).await
        }
        Commands::Incremental {
            includes,
            insensitive_includes,
            include_files,
            insensitive_include_files,
            filter,
            set_host,
            time,
        } => {
            let opts = IncrementalOptions {
                include: IncludeOptions {
                    includes,
                    insensitive_includes,
                    include_files,
                    insensitive_include_files,
                },
                filter: filter.into(),
                metadata: SnapshotMetadata {
                    hostname: set_host,
                    time,
                },
            };
            cmd::incremental::run(repo_root, opts).await
        }
        Commands::Snapshots { filter } => cmd::snapshots::run(repo_root, filter.into()).await,
        Commands::Ls { snapshot, filter } => {
            cmd::ls::run(repo_root, snapshot, filter.into()).await
        }
        Commands::Forget { snapshot } => cmd::forget::run(repo_root, snapshot).await,
    }
}
