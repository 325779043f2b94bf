//! Removal of artifacts left behind by interrupted runs
//!
//! The sweep is idempotent and safe on empty or half-processed trees: scratch
//! directories are deleted without being descended into, and only files
//! matching [`is_trash`] are touched.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::context::Context;
use crate::utils::fs::{remove_dir_all_quiet, remove_file_quiet};
use crate::utils::naming::{is_scratch_dir_name, is_trash};

/// What a sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupResult {
    pub removed_dirs: Vec<PathBuf>,
    pub removed_files: Vec<PathBuf>,
}

impl CleanupResult {
    pub fn total(&self) -> usize {
        self.removed_dirs.len() + self.removed_files.len()
    }

    fn absorb(&mut self, other: CleanupResult) {
        self.removed_dirs.extend(other.removed_dirs);
        self.removed_files.extend(other.removed_files);
    }
}

/// Sweep every configured image and model root.
pub fn clean(ctx: &Context) -> CleanupResult {
    let mut result = CleanupResult::default();
    for root in ctx.all_roots() {
        result.absorb(clean_root(&root));
    }
    tracing::info!(
        "Cleanup removed {} directories and {} files",
        result.removed_dirs.len(),
        result.removed_files.len()
    );
    result
}

/// Sweep a single directory tree.
pub fn clean_root(root: &Path) -> CleanupResult {
    let mut result = CleanupResult::default();
    let mut entries = WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = entries.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let name = entry.file_name().to_string_lossy();

        if entry.file_type().is_dir() {
            if is_scratch_dir_name(&name) {
                entries.skip_current_dir();
                if remove_dir_all_quiet(entry.path()) {
                    tracing::info!("Removed scratch directory {}", entry.path().display());
                    result.removed_dirs.push(entry.path().to_path_buf());
                }
            } else if name == "node_modules" || name.starts_with('.') {
                entries.skip_current_dir();
            }
            continue;
        }

        if is_trash(&name) && remove_file_quiet(entry.path()) {
            tracing::info!("Removed {}", entry.path().display());
            result.removed_files.push(entry.path().to_path_buf());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("robot.norm_work/images")).unwrap();
        fs::write(root.join("robot.norm_work/scene.gltf"), b"{}").unwrap();
        fs::write(root.join("robot.norm_work/images/0.webp"), b"w").unwrap();
        fs::create_dir_all(root.join("nested/deeper.norm_work")).unwrap();
        fs::write(root.join("robot.glb"), b"keep").unwrap();
        fs::write(root.join("robot.packed.glb"), b"keep").unwrap();
        fs::write(root.join("robot.tmp1.glb"), b"x").unwrap();
        fs::write(root.join("robot.tmp2.glb"), b"x").unwrap();
        fs::write(root.join("robot.mopt.glb"), b"x").unwrap();
        fs::write(root.join("robot.norm.glb"), b"x").unwrap();
        fs::write(root.join("nested/car.packed.packed.glb"), b"x").unwrap();
        fs::write(root.join("nested/.assetpack-abc123.ktx2"), b"x").unwrap();
    }

    #[test]
    fn test_clean_root_removes_only_trash() {
        let temp = TempDir::new().unwrap();
        populate(temp.path());

        let result = clean_root(temp.path());
        assert_eq!(result.removed_dirs.len(), 2);
        assert_eq!(result.removed_files.len(), 6);

        assert!(temp.path().join("robot.glb").exists());
        assert!(temp.path().join("robot.packed.glb").exists());
        assert!(!temp.path().join("robot.norm_work").exists());
        assert!(!temp.path().join("nested/deeper.norm_work").exists());
        assert!(!temp.path().join("robot.tmp1.glb").exists());
        assert!(!temp.path().join("nested/.assetpack-abc123.ktx2").exists());
    }

    #[test]
    fn test_clean_root_is_idempotent() {
        let temp = TempDir::new().unwrap();
        populate(temp.path());
        clean_root(temp.path());
        assert_eq!(clean_root(temp.path()).total(), 0);
    }

    #[test]
    fn test_clean_missing_root() {
        let result = clean_root(Path::new("/no/such/assetpack/root"));
        assert_eq!(result.total(), 0);
    }
}
