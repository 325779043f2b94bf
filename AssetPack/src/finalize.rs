//! Promotion of packed models
//!
//! `robot.packed.glb` replaces `robot.glb`, stray `.norm.glb` files are
//! deleted, and scratch directories directly under each model root are
//! removed. Files vanishing mid-run are tolerated.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::utils::fs::{remove_dir_all_quiet, remove_file_quiet};
use crate::utils::naming::{is_scratch_dir_name, is_trash, unpacked_target};
use crate::utils::walk;

/// Counts reported by the finalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalizeResult {
    pub promoted: Vec<PathBuf>,
    pub removed_normalized: usize,
    pub removed_scratch_dirs: usize,
    pub failures: usize,
}

/// Finalize every model root.
pub fn finalize_models(ctx: &Context) -> FinalizeResult {
    let mut result = FinalizeResult::default();
    for root in ctx.model_roots() {
        finalize_root(ctx, &root, &mut result);
    }
    tracing::info!(
        "Finalized {} models, removed {} normalized files and {} scratch directories",
        result.promoted.len(),
        result.removed_normalized,
        result.removed_scratch_dirs
    );
    result
}

fn finalize_root(ctx: &Context, root: &Path, result: &mut FinalizeResult) {
    for path in walk(root) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if name.ends_with(".norm.glb") {
            if remove_file_quiet(&path) {
                result.removed_normalized += 1;
            }
            continue;
        }

        // `x.packed.packed.glb` and other leftovers are never promoted.
        if is_trash(&name) {
            continue;
        }
        let Some(target) = unpacked_target(&path) else {
            continue;
        };
        match promote(&path, &target) {
            Ok(true) => {
                tracing::info!("{} -> {}", ctx.display(&path), ctx.display(&target));
                result.promoted.push(target);
            }
            Ok(false) => tracing::debug!("{} vanished before promotion", ctx.display(&path)),
            Err(e) => {
                tracing::warn!("Failed to promote {}: {e}", ctx.display(&path));
                result.failures += 1;
            }
        }
    }

    let Ok(entries) = fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        if is_dir
            && is_scratch_dir_name(&entry.file_name().to_string_lossy())
            && remove_dir_all_quiet(&entry.path())
        {
            result.removed_scratch_dirs += 1;
        }
    }
}

/// Rename `packed` over `target`. `Ok(false)` when `packed` is already gone.
fn promote(packed: &Path, target: &Path) -> io::Result<bool> {
    if target.exists() {
        remove_file_quiet(target);
    }
    match fs::rename(packed, target) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
