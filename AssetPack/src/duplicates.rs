//! Duplicate texture detection and optional hardlink collapse
//!
//! Every image-like file under the image roots is hashed with SHA-256 and
//! grouped by digest. Groups with two or more members are written to
//! `<report_dir>/duplicates.json`:
//!
//! ```json
//! {
//!   "createdAt": "2026-01-01T12:00:00+00:00",
//!   "duplicates": [["public/ui/a.png", "public/textures/a_copy.png"]]
//! }
//! ```
//!
//! With hardlinking enabled the first member of each group becomes canonical
//! and every other member is replaced by a hardlink to it. The replacement is
//! a single rename of a freshly made link over the duplicate, so the
//! duplicate's path exists at every point of the sequence.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::Result;
use crate::utils::fs::{extension_lower, remove_file_quiet, write_atomic};
use crate::utils::naming::LINK_TEMP_SUFFIX;
use crate::utils::{Progress, hash_file, run_bounded, walk};

/// Extensions considered by the scanner.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "webp", "avif", "ktx2"];

/// File name of the report inside the report directory.
pub const REPORT_FILE_NAME: &str = "duplicates.json";

/// On-disk report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    /// RFC 3339 timestamp of the scan.
    pub created_at: String,
    /// Groups of root-relative paths with identical content.
    pub duplicates: Vec<Vec<String>>,
}

/// Outcome of a scan.
#[derive(Debug, Clone, Default)]
pub struct DuplicateScan {
    pub report_path: PathBuf,
    pub files_scanned: usize,
    /// Duplicate groups, canonical member first.
    pub groups: Vec<Vec<PathBuf>>,
    /// Files that could not be read and were left out of grouping.
    pub unreadable: usize,
    pub linked: usize,
    pub already_linked: usize,
    pub link_failures: usize,
}

impl DuplicateScan {
    /// Number of files that duplicate a canonical file.
    pub fn redundant_files(&self) -> usize {
        self.groups.iter().map(|g| g.len() - 1).sum()
    }
}

/// Image-like files under the configured image roots, each listed once.
pub fn collect_images(ctx: &Context) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for root in ctx.image_roots() {
        for path in walk(&root) {
            let known = extension_lower(&path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
            if known && !files.contains(&path) {
                files.push(path);
            }
        }
    }
    files
}

/// Hash, group, write the report and optionally collapse duplicates into hardlinks.
pub fn scan_duplicates<P>(ctx: &Context, hardlink: bool, progress: P) -> Result<DuplicateScan>
where
    P: Fn(&Progress) + Send + Sync,
{
    let files = collect_images(ctx);
    let digests = run_bounded(&files, ctx.concurrency, progress, |path| hash_file(path))?;

    let mut scan = DuplicateScan {
        report_path: ctx.config.report_path(&ctx.root).join(REPORT_FILE_NAME),
        files_scanned: files.len(),
        ..DuplicateScan::default()
    };

    let mut by_digest: HashMap<String, Vec<PathBuf>> = HashMap::new();
    for (path, digest) in files.into_iter().zip(digests) {
        match digest {
            Ok(digest) => by_digest.entry(digest).or_default().push(path),
            Err(e) => {
                tracing::warn!("Failed to hash {}: {e}", ctx.display(&path));
                scan.unreadable += 1;
            }
        }
    }
    scan.groups = group_duplicates(by_digest);

    let report = DuplicateReport {
        created_at: chrono::Utc::now().to_rfc3339(),
        duplicates: scan
            .groups
            .iter()
            .map(|group| group.iter().map(|p| ctx.display(p)).collect())
            .collect(),
    };
    write_report(&scan.report_path, &report)?;
    tracing::info!(
        "Found {} duplicate groups in {} files, report written to {}",
        scan.groups.len(),
        scan.files_scanned,
        ctx.display(&scan.report_path)
    );

    if hardlink {
        for group in &scan.groups {
            let Some((canonical, rest)) = group.split_first() else {
                continue;
            };
            for duplicate in rest {
                match link_duplicate(canonical, duplicate) {
                    Ok(LinkOutcome::Linked) => {
                        tracing::info!("Linked {} -> {}", ctx.display(duplicate), ctx.display(canonical));
                        scan.linked += 1;
                    }
                    Ok(LinkOutcome::AlreadyLinked) => scan.already_linked += 1,
                    Err(e) => {
                        tracing::warn!("Failed to hardlink {}: {e}", ctx.display(duplicate));
                        scan.link_failures += 1;
                    }
                }
            }
        }
    }

    Ok(scan)
}

/// Keep groups of two or more, ordered by their first path.
fn group_duplicates(by_digest: HashMap<String, Vec<PathBuf>>) -> Vec<Vec<PathBuf>> {
    let mut groups: Vec<Vec<PathBuf>> = by_digest.into_values().filter(|g| g.len() > 1).collect();
    groups.sort();
    groups
}

fn write_report(path: &Path, report: &DuplicateReport) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    write_atomic(path, |file| {
        serde_json::to_writer_pretty(&mut *file, report)?;
        io::Write::write_all(file, b"\n")?;
        Ok(())
    })
}

/// Result of replacing one duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked,
    AlreadyLinked,
}

/// Replace `duplicate` with a hardlink to `canonical`.
///
/// The link is created under a temp name and renamed over the duplicate. On
/// failure the temp link is removed and the duplicate is untouched.
pub fn link_duplicate(canonical: &Path, duplicate: &Path) -> io::Result<LinkOutcome> {
    if same_file(canonical, duplicate)? {
        return Ok(LinkOutcome::AlreadyLinked);
    }
    let name = duplicate
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "duplicate has no file name"))?;
    let temp = duplicate.with_file_name(format!(".{}{LINK_TEMP_SUFFIX}", name.to_string_lossy()));

    if temp.is_file() {
        remove_file_quiet(&temp);
    }
    fs::hard_link(canonical, &temp)?;
    if let Err(e) = fs::rename(&temp, duplicate) {
        remove_file_quiet(&temp);
        return Err(e);
    }
    Ok(LinkOutcome::Linked)
}

#[cfg(unix)]
fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    let (a, b) = (a.metadata()?, b.metadata()?);
    Ok(a.dev() == b.dev() && a.ino() == b.ino())
}

#[cfg(not(unix))]
fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(a.canonicalize()? == b.canonicalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RunEnv};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn context(root: &Path) -> Context {
        let mut config = Config::default();
        config.img_dirs = vec!["public/textures".into(), "public/ui".into()];
        Context::new(root, config, &RunEnv::default()).unwrap()
    }

    fn write(root: &Path, rel: &str, bytes: &[u8]) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_scan_writes_report_with_groups_only() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "public/textures/a.png", b"same");
        write(root, "public/textures/b.png", b"unique");
        write(root, "public/ui/c.png", b"same");
        write(root, "public/ui/notes.txt", b"same");

        let scan = scan_duplicates(&context(root), false, |_| {}).unwrap();
        assert_eq!(scan.files_scanned, 3);
        assert_eq!(scan.redundant_files(), 1);

        let report: DuplicateReport =
            serde_json::from_str(&fs::read_to_string(&scan.report_path).unwrap()).unwrap();
        assert_eq!(
            report.duplicates,
            vec![vec!["public/textures/a.png".to_string(), "public/ui/c.png".to_string()]]
        );
        assert!(chrono::DateTime::parse_from_rfc3339(&report.created_at).is_ok());
        assert_eq!(scan.report_path, root.join("build-reports/duplicates.json"));
    }

    #[test]
    fn test_report_uses_camel_case_keys() {
        let report = DuplicateReport {
            created_at: "2026-01-01T00:00:00+00:00".into(),
            duplicates: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("duplicates").is_some());
    }

    #[test]
    fn test_missing_roots_produce_empty_report() {
        let temp = TempDir::new().unwrap();
        let scan = scan_duplicates(&context(temp.path()), true, |_| {}).unwrap();
        assert_eq!(scan.files_scanned, 0);
        assert!(scan.report_path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_hardlink_collapses_group() {
        use std::os::unix::fs::MetadataExt;

        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let a = write(root, "public/textures/a.png", b"pixels");
        let b = write(root, "public/textures/b.png", b"pixels");
        let c = write(root, "public/ui/c.png", b"pixels");

        let scan = scan_duplicates(&context(root), true, |_| {}).unwrap();
        assert_eq!(scan.linked, 2);
        assert_eq!(scan.link_failures, 0);
        let inode = a.metadata().unwrap().ino();
        for path in [&a, &b, &c] {
            assert_eq!(fs::read(path).unwrap(), b"pixels");
            assert_eq!(path.metadata().unwrap().ino(), inode);
        }

        let again = scan_duplicates(&context(root), true, |_| {}).unwrap();
        assert_eq!(again.linked, 0);
        assert_eq!(again.already_linked, 2);
    }

    #[test]
    fn test_failed_link_leaves_duplicate_in_place() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, "public/textures/a.png", b"pixels");
        let b = write(root, "public/textures/b.png", b"pixels");
        // A directory squatting on the temp link name makes the link step fail.
        fs::create_dir(root.join("public/textures/.b.png.assetpack-link")).unwrap();

        let scan = scan_duplicates(&context(root), true, |_| {}).unwrap();
        assert_eq!(scan.link_failures, 1);
        assert_eq!(scan.linked, 0);
        assert_eq!(fs::read(&b).unwrap(), b"pixels");
    }
}
