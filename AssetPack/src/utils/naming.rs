//! Derived-artifact naming conventions
//!
//! Every stage writes next to its source using a fixed suffix, and no two
//! stages share a suffix:
//!
//! | Suffix | Owner |
//! |--------|-------|
//! | `.avif`, `.webp`, `.ktx2` | image converter |
//! | `.norm.glb`, `.norm_work/` | model normalization |
//! | `.tmp1.glb`, `.tmp2.glb`, `.mopt.glb`, `.packed.glb` | model packer |
//!
//! The finalizer is the only stage that replaces an original.

use std::path::{Path, PathBuf};

/// Suffix of the per-model scratch directory.
pub const SCRATCH_SUFFIX: &str = ".norm_work";
/// Prefix of hidden temp files used for atomic writes.
pub const TEMP_PREFIX: &str = ".assetpack-";
/// Infix marking a packed model.
pub const PACKED_MARKER: &str = ".packed";
/// Suffix of the temporary hardlink created while collapsing duplicates.
pub const LINK_TEMP_SUFFIX: &str = ".assetpack-link";

/// Every path the model packer may touch for one source model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub source: PathBuf,
    pub normalized: PathBuf,
    pub scratch_dir: PathBuf,
    pub tmp1: PathBuf,
    pub tmp2: PathBuf,
    pub meshopt: PathBuf,
    pub packed: PathBuf,
}

impl ModelArtifacts {
    /// Derive the artifact set for a `.glb`/`.gltf` source.
    pub fn for_source(source: &Path) -> Self {
        let dir = source.parent().unwrap_or_else(|| Path::new(""));
        let stem = model_stem(source);
        let sibling = |suffix: &str| dir.join(format!("{stem}{suffix}"));
        Self {
            source: source.to_path_buf(),
            normalized: sibling(".norm.glb"),
            scratch_dir: sibling(SCRATCH_SUFFIX),
            tmp1: sibling(".tmp1.glb"),
            tmp2: sibling(".tmp2.glb"),
            meshopt: sibling(".mopt.glb"),
            packed: sibling(".packed.glb"),
        }
    }

    /// Intermediates removed once the packed output is in place.
    pub fn transient(&self) -> [&Path; 3] {
        [&self.tmp1, &self.tmp2, &self.meshopt]
    }
}

/// File name of a model without its `.glb`/`.gltf` extension.
pub fn model_stem(path: &Path) -> String {
    let name = file_name(path);
    let lower = name.to_ascii_lowercase();
    for ext in [".glb", ".gltf"] {
        if lower.ends_with(ext) {
            return name[..name.len() - ext.len()].to_string();
        }
    }
    name
}

/// For `robot.packed.glb` returns `robot.glb`.
pub fn unpacked_target(packed: &Path) -> Option<PathBuf> {
    const SUFFIX: &str = ".packed.glb";
    let name = file_name(packed);
    if !name.to_ascii_lowercase().ends_with(SUFFIX) || name.len() == SUFFIX.len() {
        return None;
    }
    let base = &name[..name.len() - SUFFIX.len()];
    Some(packed.with_file_name(format!("{base}.glb")))
}

/// Whether the file is a transient artifact that a finished run never leaves behind.
///
/// Covers numbered temp models (`x.tmp1.glb`), meshopt candidates, stray
/// normalized models, doubly-suffixed packed outputs (`x.packed.packed.glb`),
/// hidden atomic-write temps and interrupted hardlink temps.
pub fn is_trash(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.starts_with(TEMP_PREFIX) || lower.ends_with(LINK_TEMP_SUFFIX) {
        return true;
    }
    if lower.ends_with(".norm.glb") || lower.ends_with(".norm.gltf") || lower.ends_with(".mopt.glb") {
        return true;
    }
    if lower.contains(".packed.packed.") {
        return true;
    }
    lower
        .strip_suffix(".glb")
        .and_then(|rest| rest.rsplit_once(".tmp"))
        .is_some_and(|(_, digits)| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Whether the directory name marks a scratch directory.
pub fn is_scratch_dir_name(name: &str) -> bool {
    name.ends_with(SCRATCH_SUFFIX)
}

/// Whether any component of `path` is a scratch directory.
pub fn is_inside_scratch_dir(path: &Path) -> bool {
    path.parent().is_some_and(|parent| {
        parent
            .components()
            .any(|c| is_scratch_dir_name(&c.as_os_str().to_string_lossy()))
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_model_artifacts() {
        let artifacts = ModelArtifacts::for_source(Path::new("/p/models/robot.glb"));
        assert_eq!(artifacts.normalized, Path::new("/p/models/robot.norm.glb"));
        assert_eq!(artifacts.scratch_dir, Path::new("/p/models/robot.norm_work"));
        assert_eq!(artifacts.tmp1, Path::new("/p/models/robot.tmp1.glb"));
        assert_eq!(artifacts.meshopt, Path::new("/p/models/robot.mopt.glb"));
        assert_eq!(artifacts.packed, Path::new("/p/models/robot.packed.glb"));

        let gltf = ModelArtifacts::for_source(Path::new("scene.GLTF"));
        assert_eq!(gltf.packed, Path::new("scene.packed.glb"));
    }

    #[test]
    fn test_unpacked_target() {
        assert_eq!(
            unpacked_target(Path::new("m/robot.packed.glb")),
            Some(PathBuf::from("m/robot.glb"))
        );
        assert_eq!(unpacked_target(Path::new("m/robot.glb")), None);
        assert_eq!(unpacked_target(Path::new("m/.packed.glb")), None);
        assert_eq!(
            unpacked_target(Path::new("m/Robot.PACKED.GLB")),
            Some(PathBuf::from("m/Robot.glb"))
        );
    }

    #[test]
    fn test_is_trash() {
        assert!(is_trash("robot.tmp1.glb"));
        assert!(is_trash("robot.tmp12.glb"));
        assert!(is_trash("robot.mopt.glb"));
        assert!(is_trash("robot.norm.glb"));
        assert!(is_trash("robot.packed.packed.glb"));
        assert!(is_trash(".assetpack-x1y2z3.ktx2"));
        assert!(is_trash(".hud.png.assetpack-link"));
        assert!(!is_trash("robot.glb"));
        assert!(!is_trash("robot.packed.glb"));
        assert!(!is_trash("robot.tmp.glb"));
        assert!(!is_trash("attempt1.glb"));
    }

    #[test]
    fn test_inside_scratch_dir() {
        assert!(is_inside_scratch_dir(Path::new("m/robot.norm_work/scene.gltf")));
        assert!(!is_inside_scratch_dir(Path::new("m/robot.glb")));
    }
}
