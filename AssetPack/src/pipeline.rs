//! Full pipeline: clean → duplicates → images → models → finalize
//!
//! Stages run strictly one after another because each reads the tree the
//! previous one left. A stage error stops the run; per-file failures inside a
//! stage do not. A bypass variable (`CI`, `SKIP_ASSET_PIPELINE`, ...) skips
//! everything.

use crate::cleanup::{CleanupResult, clean};
use crate::config::RunEnv;
use crate::context::Context;
use crate::duplicates::{DuplicateScan, scan_duplicates};
use crate::error::Result;
use crate::finalize::{FinalizeResult, finalize_models};
use crate::images::{ImageBatchResult, convert_images};
use crate::models::{PackBatchResult, pack_models};
use crate::utils::Progress;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clean,
    ScanDuplicates,
    ConvertImages,
    PackModels,
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Clean,
        Stage::ScanDuplicates,
        Stage::ConvertImages,
        Stage::PackModels,
        Stage::Finalize,
    ];

    /// 1-based position in [`Stage::ALL`].
    pub fn number(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).map_or(0, |i| i + 1)
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::Clean => "Cleaning leftovers",
            Stage::ScanDuplicates => "Scanning duplicates",
            Stage::ConvertImages => "Converting images",
            Stage::PackModels => "Packing models",
            Stage::Finalize => "Finalizing models",
        }
    }
}

/// Options of a full run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Collapse duplicate images into hardlinks.
    pub hardlink: bool,
}

/// Results of every stage of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub cleanup: CleanupResult,
    pub duplicates: DuplicateScan,
    pub images: ImageBatchResult,
    pub models: PackBatchResult,
    pub finalize: FinalizeResult,
}

impl PipelineReport {
    /// Whether any model failed to pack.
    pub fn has_failures(&self) -> bool {
        self.models.failed_count() > 0
    }
}

#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Skipped because the named environment variable is set.
    Bypassed { variable: String },
    Completed(Box<PipelineReport>),
}

/// Run the full pipeline.
///
/// `on_stage` is called as each stage starts; `progress` receives per-file
/// progress of the batch stages.
pub fn run_pipeline<S, P>(
    ctx: &Context,
    env: &RunEnv,
    options: PipelineOptions,
    on_stage: S,
    progress: P,
) -> Result<PipelineOutcome>
where
    S: Fn(Stage),
    P: Fn(Stage, &Progress) + Send + Sync,
{
    if let Some(variable) = &env.bypass {
        tracing::info!("{variable} is set, skipping the asset pipeline");
        return Ok(PipelineOutcome::Bypassed {
            variable: variable.clone(),
        });
    }

    on_stage(Stage::Clean);
    let cleanup = clean(ctx);

    on_stage(Stage::ScanDuplicates);
    let duplicates = scan_duplicates(ctx, options.hardlink, |p| progress(Stage::ScanDuplicates, p))?;

    on_stage(Stage::ConvertImages);
    let images = convert_images(ctx, |p| progress(Stage::ConvertImages, p))?;

    on_stage(Stage::PackModels);
    let models = pack_models(ctx, |p| progress(Stage::PackModels, p))?;

    on_stage(Stage::Finalize);
    let finalize = finalize_models(ctx);

    Ok(PipelineOutcome::Completed(Box::new(PipelineReport {
        cleanup,
        duplicates,
        images,
        models,
        finalize,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[test]
    fn test_bypass_skips_every_stage() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("public/models")).unwrap();
        std::fs::write(temp.path().join("public/models/robot.tmp1.glb"), b"x").unwrap();

        let env = RunEnv::from_lookup(|key| (key == "CI").then(|| "true".to_string()));
        let ctx = Context::new(temp.path(), Config::default(), &env).unwrap();
        let started = Mutex::new(Vec::new());
        let outcome = run_pipeline(
            &ctx,
            &env,
            PipelineOptions::default(),
            |s| started.lock().unwrap().push(s),
            |_, _| {},
        )
        .unwrap();

        assert!(matches!(outcome, PipelineOutcome::Bypassed { ref variable } if variable == "CI"));
        assert!(started.lock().unwrap().is_empty());
        assert!(temp.path().join("public/models/robot.tmp1.glb").exists());
    }

    #[test]
    fn test_empty_project_runs_all_stages() {
        let temp = TempDir::new().unwrap();
        let ctx = Context::new(temp.path(), Config::default(), &RunEnv::default()).unwrap();
        let started = Mutex::new(Vec::new());
        let outcome = run_pipeline(
            &ctx,
            &RunEnv::default(),
            PipelineOptions::default(),
            |s| started.lock().unwrap().push(s),
            |_, _| {},
        )
        .unwrap();

        assert!(matches!(outcome, PipelineOutcome::Completed(_)));
        assert_eq!(*started.lock().unwrap(), Stage::ALL.to_vec());
        assert!(temp.path().join("build-reports/duplicates.json").exists());
    }

    #[test]
    fn test_stage_numbers() {
        assert_eq!(Stage::Clean.number(), 1);
        assert_eq!(Stage::Finalize.number(), 5);
    }
}
