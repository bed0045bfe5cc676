/*!
ignoregrets CLI - snapshot and restore git-ignored files.

Every command resolves the repository root and passes the settings from
`.ignoregrets/config.yaml` to the core engine explicitly. Only `init` and
`snapshot` write a default config file when none exists.
*/

mod hooks;

use anyhow::Context;
use clap::{Parser, Subcommand};
use ignoregrets_core::{
    observability, GitCli, IgnoregretsError, Manifest, RepoLayout, RestoreRequest, Settings,
    SnapshotEngine, SnapshotListing,
};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "ignoregrets")]
#[command(about = "Snapshot and restore git-ignored files per commit")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Repository working tree (defaults to the enclosing git repository)
    #[arg(short, long, global = true, env = "IGNOREGRETS_REPO")]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the state directory and default configuration
    Init {
        /// Install git hooks for the configured trigger events
        #[arg(long)]
        hooks: bool,
        /// Remove previously installed git hooks
        #[arg(long, conflicts_with = "hooks")]
        remove_hooks: bool,
    },
    /// Snapshot ignored files for the current commit
    Snapshot,
    /// Restore a snapshot into the working tree
    Restore {
        /// Commit to restore (defaults to HEAD)
        #[arg(short, long)]
        commit: Option<String>,
        /// Snapshot to use, 0 = newest
        #[arg(short, long, default_value_t = 0)]
        snapshot: usize,
        /// Overwrite files that already exist
        #[arg(short, long)]
        force: bool,
        /// Show what would be restored without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// List all snapshots
    List,
    /// Show the manifest of a snapshot
    Inspect {
        /// Commit of the snapshot (defaults to HEAD)
        #[arg(short, long)]
        commit: Option<String>,
        /// Snapshot to use, 0 = newest
        #[arg(short, long, default_value_t = 0)]
        snapshot: usize,
        /// Print the checksum of every file
        #[arg(long)]
        checksums: bool,
    },
    /// Compare ignored files with the newest snapshot of HEAD
    Status {
        /// Print both checksums of modified files
        #[arg(long)]
        checksums: bool,
    },
    /// Check every file of a snapshot against its manifest
    Verify {
        /// Commit of the snapshot (defaults to HEAD)
        #[arg(short, long)]
        commit: Option<String>,
        /// Snapshot to use, 0 = newest
        #[arg(short, long, default_value_t = 0)]
        snapshot: usize,
    },
    /// Delete old snapshots, keeping the newest N per commit
    Prune {
        /// Snapshots to keep per commit (defaults to the configured retention)
        #[arg(long)]
        retention: Option<usize>,
    },
}

#[derive(Tabled)]
struct SnapshotInfo {
    #[tabled(rename = "Commit")]
    commit: String,
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Created")]
    timestamp: String,
    #[tabled(rename = "Files")]
    files: usize,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "File")]
    file_name: String,
}

impl From<&SnapshotListing> for SnapshotInfo {
    fn from(listing: &SnapshotListing) -> Self {
        Self {
            commit: short_commit(&listing.manifest.commit_hash).to_string(),
            index: listing.manifest.index,
            timestamp: format_timestamp(listing.manifest.timestamp.timestamp()),
            files: listing.manifest.file_count(),
            size: format_size(listing.size_bytes),
            file_name: listing.file_name.clone(),
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    observability::init_logging(cli.verbose, cli.json_logs)?;

    let root = resolve_root(cli.repo.as_deref())?;
    let layout = RepoLayout::new(&root);
    let settings = load_settings(&layout, cli.command.creates_config())?;

    let engine = SnapshotEngine::new(GitCli::new(&root), root);

    match cli.command {
        Commands::Init {
            hooks,
            remove_hooks,
        } => init(&engine, settings, hooks, remove_hooks)?,
        Commands::Snapshot => snapshot(&engine, &settings)?,
        Commands::Restore {
            commit,
            snapshot,
            force,
            dry_run,
        } => restore(&engine, commit, snapshot, force, dry_run)?,
        Commands::List => list_snapshots(&engine)?,
        Commands::Inspect {
            commit,
            snapshot,
            checksums,
        } => inspect(&engine, commit, snapshot, checksums)?,
        Commands::Status { checksums } => status(&engine, &settings, checksums)?,
        Commands::Verify { commit, snapshot } => verify(&engine, commit, snapshot)?,
        Commands::Prune { retention } => {
            prune(&engine, retention.unwrap_or(settings.retention_count))?
        }
    }

    Ok(())
}

impl Commands {
    /// Whether the command may write a default config file
    fn creates_config(&self) -> bool {
        matches!(self, Commands::Init { .. } | Commands::Snapshot)
    }
}

fn load_settings(layout: &RepoLayout, create: bool) -> Result<Settings, anyhow::Error> {
    let settings = if create {
        layout.load_settings()
    } else {
        layout.read_settings()
    }
    .with_context(|| format!("Failed to load {}", layout.config_path().display()))?;
    settings.validate()?;
    Ok(settings)
}

/// `--repo` if given, else the top level of the enclosing git working tree
fn resolve_root(repo: Option<&std::path::Path>) -> Result<PathBuf, anyhow::Error> {
    if let Some(repo) = repo {
        return Ok(repo.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let git = GitCli::new(&cwd);
    git.ensure_repository()?;
    Ok(git.toplevel()?)
}

fn commit_or_head(
    engine: &SnapshotEngine<GitCli>,
    commit: Option<String>,
) -> Result<String, anyhow::Error> {
    match commit {
        Some(commit) => Ok(commit),
        None => Ok(engine.current_revision()?),
    }
}

fn init(
    engine: &SnapshotEngine<GitCli>,
    mut settings: Settings,
    install: bool,
    remove: bool,
) -> Result<(), anyhow::Error> {
    let layout = engine.layout();
    layout.ensure_dirs()?;
    println!("Initialized {}", layout.state_dir().display());

    if !install && !remove {
        return Ok(());
    }

    let git_dir = engine.revision_source().git_dir()?;
    if install {
        for hook in hooks::hooks_for(&settings) {
            match hooks::install_hook(&git_dir, &hook)? {
                hooks::HookInstall::Installed => println!("✓ Installed {} hook", hook.name),
                hooks::HookInstall::Updated => println!("✓ Updated {} hook", hook.name),
                hooks::HookInstall::Foreign => println!(
                    "✗ {} already exists and was not written by ignoregrets, left untouched",
                    hooks::hook_path(&git_dir, &hook).display()
                ),
            }
        }
    } else {
        for hook in [hooks::PRE_COMMIT, hooks::POST_CHECKOUT] {
            if hooks::uninstall_hook(&git_dir, &hook)? {
                println!("✓ Removed {} hook", hook.name);
            }
        }
    }

    settings.hooks_enabled = install;
    layout.save_settings(&settings)?;
    Ok(())
}

fn snapshot(engine: &SnapshotEngine<GitCli>, settings: &Settings) -> Result<(), anyhow::Error> {
    match engine.create_snapshot(settings) {
        Ok(summary) => {
            println!(
                "✓ Snapshot {} of {} created: {} files, {}",
                summary.index,
                short_commit(&summary.commit),
                summary.file_count,
                format_size(summary.compressed_size)
            );
            println!("  {}", summary.path.display());
        }
        Err(IgnoregretsError::NothingToSnapshot) => {
            warn!("no ignored files matched the filters");
            println!("Nothing to snapshot");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn restore(
    engine: &SnapshotEngine<GitCli>,
    commit: Option<String>,
    index: usize,
    force: bool,
    dry_run: bool,
) -> Result<(), anyhow::Error> {
    let commit = commit_or_head(engine, commit)?;
    let request = RestoreRequest::new(commit)
        .index(index)
        .force(force)
        .dry_run(dry_run);

    let report = match engine.restore(&request) {
        Ok(report) => report,
        Err(e @ IgnoregretsError::SnapshotNotFound { .. }) if dry_run => {
            // post-checkout runs a dry run on every checkout
            println!("{e}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let verb = if report.dry_run { "Would restore" } else { "Restored" };
    for outcome in &report.outcomes {
        match outcome.action {
            ignoregrets_core::RestoreAction::Restore => println!("  {verb}: {}", outcome.path),
            ignoregrets_core::RestoreAction::Skip => {
                println!("  Skipped (exists): {}", outcome.path)
            }
        }
    }
    println!(
        "{verb} {} files, skipped {} from {}",
        report.restored().len(),
        report.skipped().len(),
        report.snapshot.display()
    );
    if !report.skipped().is_empty() && !force {
        println!("Use --force to overwrite existing files");
    }
    Ok(())
}

fn list_snapshots(engine: &SnapshotEngine<GitCli>) -> Result<(), anyhow::Error> {
    info!("Listing snapshots from {}", engine.store().dir().display());

    let listings = engine.list()?;
    if listings.is_empty() {
        println!("No snapshots found");
        return Ok(());
    }

    let rows: Vec<SnapshotInfo> = listings.iter().map(SnapshotInfo::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn inspect(
    engine: &SnapshotEngine<GitCli>,
    commit: Option<String>,
    index: usize,
    checksums: bool,
) -> Result<(), anyhow::Error> {
    let commit = commit_or_head(engine, commit)?;
    let manifest = engine.inspect(&commit, index)?;
    print_manifest(&manifest, checksums);
    Ok(())
}

fn print_manifest(manifest: &Manifest, checksums: bool) {
    println!("Snapshot Details:");
    println!("  Commit: {}", manifest.commit_hash);
    println!("  Index: {}", manifest.index);
    println!(
        "  Created: {}",
        format_timestamp(manifest.timestamp.timestamp())
    );
    println!("  Format Version: {}", manifest.format_version);
    println!("  Retention: {}", manifest.effective_config.retention_count);
    if !manifest.effective_config.exclude.is_empty() {
        println!("  Exclude: {}", manifest.effective_config.exclude.join(", "));
    }
    if !manifest.effective_config.include.is_empty() {
        println!("  Include: {}", manifest.effective_config.include.join(", "));
    }
    println!("  Files ({}):", manifest.file_count());
    for (path, checksum) in &manifest.files {
        if checksums {
            println!("    {checksum}  {path}");
        } else {
            println!("    {path}");
        }
    }
}

fn status(
    engine: &SnapshotEngine<GitCli>,
    settings: &Settings,
    checksums: bool,
) -> Result<(), anyhow::Error> {
    let report = engine.status(settings)?;
    println!("Status against newest snapshot of {}:", short_commit(&report.commit));

    if report.is_clean() {
        println!("  No changes ({} files)", report.unchanged.len());
        return Ok(());
    }
    for file in &report.modified {
        println!("  modified: {}", file.path);
        if checksums {
            println!("    snapshot: {}", file.snapshot_checksum);
            println!("    current:  {}", file.current_checksum);
        }
    }
    for path in &report.added {
        println!("  added:    {path}");
    }
    for path in &report.deleted {
        println!("  deleted:  {path}");
    }
    Ok(())
}

fn verify(
    engine: &SnapshotEngine<GitCli>,
    commit: Option<String>,
    index: usize,
) -> Result<(), anyhow::Error> {
    let commit = commit_or_head(engine, commit)?;
    info!("Verifying snapshot {} of {}", index, commit);

    match engine.verify(&commit, index) {
        Ok(manifest) => {
            println!(
                "✓ Snapshot is valid and integrity check passed ({} files)",
                manifest.file_count()
            );
        }
        Err(IgnoregretsError::IntegrityCheckFailed {
            path,
            expected,
            actual,
        }) => {
            error!("✗ Integrity check failed for {}:", path);
            error!("  Expected hash: {}", expected);
            error!("  Actual hash: {}", actual);
            return Err(anyhow::anyhow!("Integrity check failed"));
        }
        Err(e) => {
            error!("✗ Failed to verify snapshot: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}

fn prune(engine: &SnapshotEngine<GitCli>, retention: usize) -> Result<(), anyhow::Error> {
    let report = engine.prune(retention)?;
    if report.deleted_count() == 0 {
        println!("Nothing to prune");
        return Ok(());
    }
    for (commit, files) in &report.deleted {
        println!(
            "  {}: deleted {} snapshot(s)",
            short_commit(commit),
            files.len()
        );
    }
    println!("✓ Deleted {} snapshot(s)", report.deleted_count());
    Ok(())
}

fn short_commit(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn format_timestamp(timestamp: i64) -> String {
    use chrono::{Local, TimeZone};

    match Local.timestamp_opt(timestamp, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => timestamp.to_string(),
    }
}
