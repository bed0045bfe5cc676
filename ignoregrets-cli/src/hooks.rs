//! Git hook installation for `ignoregrets init --hooks`.

use anyhow::{Context, Result};
use ignoregrets_core::Settings;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Marker line identifying hooks this tool wrote
pub const HOOK_MARKER: &str = "# installed by ignoregrets";

/// A hook script and the git event it runs on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSpec {
    pub name: &'static str,
    pub command: &'static str,
}

pub const PRE_COMMIT: HookSpec = HookSpec {
    name: "pre-commit",
    command: "ignoregrets snapshot",
};

pub const POST_CHECKOUT: HookSpec = HookSpec {
    name: "post-checkout",
    command: "ignoregrets restore --dry-run",
};

impl HookSpec {
    pub fn script(&self) -> String {
        format!("#!/bin/sh\n{HOOK_MARKER}\n{}\n", self.command)
    }
}

/// Hooks implied by the trigger events in `settings`
pub fn hooks_for(settings: &Settings) -> Vec<HookSpec> {
    let mut hooks = Vec::new();
    if settings.snapshot_on.iter().any(|e| e == "commit") {
        hooks.push(PRE_COMMIT);
    }
    if settings.restore_on.iter().any(|e| e == "checkout") {
        hooks.push(POST_CHECKOUT);
    }
    hooks
}

/// What `install_hook` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookInstall {
    Installed,
    Updated,
    /// A hook not written by this tool already exists and was left alone
    Foreign,
}

/// Write `hook` into `<git_dir>/hooks`
///
/// An existing hook is only replaced when it carries [`HOOK_MARKER`].
pub fn install_hook(git_dir: &Path, hook: &HookSpec) -> Result<HookInstall> {
    let hooks_dir = git_dir.join("hooks");
    fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("Failed to create {}", hooks_dir.display()))?;
    let path = hooks_dir.join(hook.name);

    let outcome = match fs::read_to_string(&path) {
        Ok(existing) if existing.contains(HOOK_MARKER) => HookInstall::Updated,
        Ok(_) => {
            warn!(hook = hook.name, path = %path.display(), "existing hook left untouched");
            return Ok(HookInstall::Foreign);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HookInstall::Installed,
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };

    fs::write(&path, hook.script())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    make_executable(&path)?;
    info!(hook = hook.name, path = %path.display(), "hook installed");
    Ok(outcome)
}

/// Remove `hook` if this tool wrote it; returns whether a file was removed
pub fn uninstall_hook(git_dir: &Path, hook: &HookSpec) -> Result<bool> {
    let path = hook_path(git_dir, hook);
    match fs::read_to_string(&path) {
        Ok(existing) if existing.contains(HOOK_MARKER) => {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            debug!(hook = hook.name, "hook removed");
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

pub fn hook_path(git_dir: &Path, hook: &HookSpec) -> PathBuf {
    git_dir.join("hooks").join(hook.name)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .with_context(|| format!("Failed to mark {} executable", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
