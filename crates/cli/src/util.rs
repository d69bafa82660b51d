//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use strata_core::Repository;
use strata_journal::{Journal, SnapshotFilter, StoredSnapshot};

/// Reference that selects the most recent matching snapshot
pub const LATEST: &str = "latest";

/// Name of this machine, or "unknown"
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Name of the invoking user, or "unknown"
pub fn username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Repository location from `--repo`, or the current directory
pub fn repo_path(repo: Option<PathBuf>) -> Result<PathBuf> {
    match repo {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Open an existing repository along with its snapshot journal
pub fn open_repo(root: &Path) -> Result<(Repository, Journal)> {
    let repo = Repository::open(root)
        .with_context(|| format!("Failed to open repository at {}", root.display()))?;
    let journal = Journal::open(&repo.snapshots_dir())?;
    Ok((repo, journal))
}

/// Resolve a snapshot reference
///
/// Supports:
/// - "latest": most recent snapshot matching `filter`
/// - Full id or unique hex prefix
pub fn resolve_snapshot_ref(
    reference: &str,
    journal: &Journal,
    filter: &SnapshotFilter,
) -> Result<StoredSnapshot> {
    if reference == LATEST {
        return journal
            .find_latest(filter)?
            .ok_or_else(|| anyhow::anyhow!("No snapshot matches the given filter"));
    }

    if reference.is_empty() || !reference.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid snapshot reference: '{}'", reference);
    }

    journal
        .find_by_prefix(reference)?
        .ok_or_else(|| anyhow::anyhow!("Snapshot not found: {}", reference))
}

/// Format a time relative to `now` ("2 hours ago")
pub fn format_relative_time(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    const UNITS: [(i64, &str); 4] = [
        (604800, "weeks"),
        (86400, "days"),
        (3600, "hours"),
        (60, "minutes"),
    ];

    let seconds = (now - time).num_seconds();
    if seconds < 0 {
        return "in the future".to_string();
    }

    UNITS
        .iter()
        .find(|(span, _)| seconds >= *span)
        .map(|(span, unit)| format!("{} {} ago", seconds / span, unit))
        .unwrap_or_else(|| format!("{} seconds ago", seconds))
}

/// Format a time as "2024-01-03 14:30:00"
pub fn format_absolute_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format a byte count with a binary unit ("1.50 KB")
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB"] {
        if value < 1024.0 {
            return if unit == "B" {
                format!("{} B", bytes)
            } else {
                format!("{:.2} {}", value, unit)
            };
        }
        value /= 1024.0;
    }
    format!("{:.2} GB", value)
}

/// Display a snapshot on one line
pub fn display_snapshot_compact(stored: &StoredSnapshot, now: DateTime<Utc>) {
    let snapshot = &stored.snapshot;
    let tags = if snapshot.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", snapshot.tags.join(","))
    };

    println!(
        "{} {} {} {}{} {}",
        stored.id.short().yellow(),
        format_absolute_time(snapshot.time),
        format!("({})", format_relative_time(snapshot.time, now)).dimmed(),
        snapshot.hostname.cyan(),
        tags,
        snapshot.paths.join(" ")
    );
}
