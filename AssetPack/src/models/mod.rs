//! Model packing stage
//!
//! Every `.glb`/`.gltf` under the model roots is packed independently with
//! bounded concurrency. A failing model is recorded and never stops its
//! siblings; the batch result carries per-model metrics for the summary.

pub mod glb;
pub mod normalize;
pub mod pack;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::utils::fs::extension_lower;
use crate::utils::naming::{PACKED_MARKER, is_inside_scratch_dir, is_trash};
use crate::utils::{ModelArtifacts, Progress, run_bounded, walk};

pub use glb::GlbContainer;
pub use pack::{Codec, ModelMetrics, pack_model};

/// Outcome of packing one model.
#[derive(Debug, Clone)]
pub struct ModelOutcome {
    pub source: PathBuf,
    pub result: std::result::Result<ModelMetrics, String>,
}

/// Result of a packing run.
#[derive(Debug, Clone, Default)]
pub struct PackBatchResult {
    pub outcomes: Vec<ModelOutcome>,
}

impl PackBatchResult {
    pub fn metrics(&self) -> impl Iterator<Item = &ModelMetrics> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.source.as_path(), e.as_str())))
    }

    pub fn packed_count(&self) -> usize {
        self.metrics().filter(|m| !m.skipped).count()
    }

    /// Embedded WebP textures converted across all models.
    pub fn webp_converted(&self) -> usize {
        self.metrics().map(|m| m.webp_converted).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.metrics().filter(|m| m.skipped).count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Total input and packed bytes over successful models.
    pub fn totals(&self) -> (u64, u64) {
        self.metrics()
            .fold((0, 0), |(input, packed), m| (input + m.input, packed + m.packed))
    }
}

/// Whether `path` is a model the packer should take as input.
pub fn is_model_source(path: &Path, skip_packed: bool) -> bool {
    if !extension_lower(path).is_some_and(|ext| ext == "glb" || ext == "gltf") {
        return false;
    }
    if is_inside_scratch_dir(path) {
        return false;
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    // Normalized models and leftovers of an interrupted run are never inputs.
    if is_trash(&name) {
        return false;
    }
    !(skip_packed && name.contains(PACKED_MARKER))
}

/// Model sources under the model roots.
///
/// `robot.glb` and `robot.gltf` in one directory would share every artifact
/// name, so only one of them is kept: the `.glb`.
pub fn collect_models(ctx: &Context) -> Vec<PathBuf> {
    let skip_packed = ctx.config.models.skip_packed;
    let mut models: Vec<PathBuf> = Vec::new();
    let mut by_artifacts: HashMap<String, usize> = HashMap::new();
    for root in ctx.model_roots() {
        for path in walk(&root) {
            if !is_model_source(&path, skip_packed) || models.contains(&path) {
                continue;
            }
            let key = ModelArtifacts::for_source(&path)
                .packed
                .to_string_lossy()
                .to_ascii_lowercase();
            match by_artifacts.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(models.len());
                    models.push(path);
                }
                Entry::Occupied(slot) => {
                    let kept = &mut models[*slot.get()];
                    let skipped = if is_glb_file(&path) && !is_glb_file(kept) {
                        std::mem::replace(kept, path)
                    } else {
                        path
                    };
                    tracing::warn!(
                        "skip {}: shares its output names with {}",
                        ctx.display(&skipped),
                        ctx.display(kept)
                    );
                }
            }
        }
    }
    models
}

fn is_glb_file(path: &Path) -> bool {
    extension_lower(path).is_some_and(|ext| ext == "glb")
}

/// Pack every model.
///
/// A missing `gltf-transform` is fatal to the run: every step needs it.
pub fn pack_models<P>(ctx: &Context, progress: P) -> Result<PackBatchResult>
where
    P: Fn(&Progress) + Send + Sync,
{
    let models = collect_models(ctx);
    if models.is_empty() {
        tracing::info!("No models found");
        return Ok(PackBatchResult::default());
    }

    let tool = ctx.gltf_transform();
    if !tool.is_available() {
        return Err(Error::ToolNotFound {
            tool: tool.program().to_string(),
        });
    }

    let outcomes = run_bounded(&models, ctx.concurrency, progress, |source| {
        let result = pack_model(ctx, source, &tool).map_err(|e| {
            tracing::error!("{}: {e}", ctx.display(source));
            e.to_string()
        });
        ModelOutcome {
            source: source.clone(),
            result,
        }
    })?;
    Ok(PackBatchResult { outcomes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_model_source() {
        assert!(is_model_source(Path::new("m/robot.glb"), true));
        assert!(is_model_source(Path::new("m/scene.GLTF"), true));
        assert!(!is_model_source(Path::new("m/robot.packed.glb"), true));
        assert!(is_model_source(Path::new("m/robot.packed.glb"), false));
        assert!(!is_model_source(Path::new("m/robot.norm.glb"), false));
        assert!(!is_model_source(Path::new("m/robot.norm_work/scene.gltf"), false));
        assert!(!is_model_source(Path::new("m/robot.tmp1.glb"), false));
        assert!(!is_model_source(Path::new("m/robot.mopt.glb"), false));
        assert!(!is_model_source(Path::new("m/robot.png"), false));
    }

    #[test]
    fn test_same_stem_sources_keep_the_glb() {
        use crate::config::{Config, RunEnv};
        use std::fs;

        let temp = tempfile::TempDir::new().unwrap();
        let models = temp.path().join("public/models");
        fs::create_dir_all(models.join("props")).unwrap();
        for name in ["robot.gltf", "robot.glb", "scene.gltf", "props/robot.gltf"] {
            fs::write(models.join(name), b"{}").unwrap();
        }

        let ctx = Context::new(temp.path(), Config::default(), &RunEnv::default()).unwrap();
        let found = collect_models(&ctx);

        assert_eq!(
            found,
            vec![
                models.join("props/robot.gltf"),
                models.join("robot.glb"),
                models.join("scene.gltf"),
            ]
        );
        let packed: Vec<PathBuf> = found.iter().map(|p| ModelArtifacts::for_source(p).packed).collect();
        for (i, a) in packed.iter().enumerate() {
            assert!(packed[i + 1..].iter().all(|b| b != a));
        }
    }

    #[test]
    fn test_batch_counts() {
        let metrics = |skipped| ModelMetrics {
            source: PathBuf::from("m.glb"),
            input: 100,
            normalized: 100,
            draco: Some(40),
            meshopt: Some(50),
            packed: 40,
            winner: Some(Codec::Draco),
            webp_converted: 1,
            skipped,
        };
        let result = PackBatchResult {
            outcomes: vec![
                ModelOutcome {
                    source: PathBuf::from("a.glb"),
                    result: Ok(metrics(false)),
                },
                ModelOutcome {
                    source: PathBuf::from("b.glb"),
                    result: Ok(metrics(true)),
                },
                ModelOutcome {
                    source: PathBuf::from("c.glb"),
                    result: Err("boom".into()),
                },
            ],
        };
        assert_eq!(result.packed_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.totals(), (200, 80));
        assert_eq!(result.webp_converted(), 2);
    }
}
