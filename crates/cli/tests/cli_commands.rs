//! End-to-end runs of the `strata` binary

mod common;

use anyhow::Result;
use common::cli::StrataCommand;
use common::Workspace;

fn strata(ws: &Workspace, args: &[&str]) -> StrataCommand {
    let mut cmd = StrataCommand::new(ws.path());
    cmd.args(&["--repo", ws.repo_root.to_str().unwrap_or_default()])
        .args(args);
    cmd
}

#[test]
fn test_init_creates_repository() -> Result<()> {
    let ws = Workspace::uninitialized()?;

    let result = strata(&ws, &["init"]).assert_success()?;
    assert!(result.contains_stdout("Successfully initialized"));
    assert!(ws.repo_root.join("config.toml").exists());

    let again = strata(&ws, &["init"]).assert_failure()?;
    assert!(again.contains_stderr("already initialized"));
    Ok(())
}

#[test]
fn test_backup_incremental_and_ls() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write("docs/a.txt", b"alpha")?;
    let data = ws.path().display().to_string();

    let first = strata(&ws, &["backup", &data, "--tag", "daily"]).assert_success()?;
    let first_id = first.parse_snapshot_id();
    assert!(first_id.is_some(), "no id in {:?}", first.stdout);

    let added = ws.write("notes.txt", b"notes")?;
    let second = strata(&ws, &["incremental", "--include", &added]).assert_success()?;
    let second_id = second.parse_snapshot_id();
    assert!(second_id.is_some(), "no id in {:?}", second.stdout);
    assert_ne!(first_id, second_id);

    let listing = strata(&ws, &["ls", "latest"]).assert_success()?;
    assert!(listing.contains_stdout(&format!("{}/notes.txt", data)));
    assert!(listing.contains_stdout(&format!("{}/docs/a.txt", data)));

    let snapshots = strata(&ws, &["snapshots", "--tag", "daily"]).assert_success()?;
    assert!(snapshots.contains_stdout("2 snapshots"));
    Ok(())
}

#[test]
fn test_incremental_without_options_fails() -> Result<()> {
    let ws = Workspace::new()?;

    let result = strata(&ws, &["incremental"]).assert_failure()?;
    assert!(result.contains_stderr("nothing to do"), "{}", result.stderr);
    Ok(())
}

#[test]
fn test_incremental_without_snapshot_fails() -> Result<()> {
    let ws = Workspace::new()?;
    let file = ws.write("a.txt", b"a")?;

    let result = strata(&ws, &["incremental", "-i", &file]).assert_failure()?;
    assert!(result.contains_stderr("no snapshot found"), "{}", result.stderr);
    Ok(())
}

#[test]
fn test_repository_from_environment() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write("a.txt", b"a")?;
    let data = ws.path().display().to_string();
    let repo = ws.repo_root.display().to_string();

    StrataCommand::new(ws.path())
        .args(&["backup", &data])
        .env("STRATA_REPOSITORY", &repo)
        .assert_success()?;

    let result = StrataCommand::new(ws.path())
        .args(&["snapshots"])
        .env("STRATA_REPOSITORY", &repo)
        .assert_success()?;
    assert!(result.contains_stdout("1 snapshots"));
    Ok(())
}

#[test]
fn test_forget_by_prefix() -> Result<()> {
    let ws = Workspace::new()?;
    ws.write("a.txt", b"a")?;
    let data = ws.path().display().to_string();

    let backup = strata(&ws, &["backup", &data]).assert_success()?;
    let id = backup
        .parse_snapshot_id()
        .ok_or_else(|| anyhow::anyhow!("no id in {:?}", backup.stdout))?;

    strata(&ws, &["forget", &id[..12]]).assert_success()?;

    let result = strata(&ws, &["snapshots"]).assert_success()?;
    assert!(result.contains_stdout("No snapshots"));
    Ok(())
}
