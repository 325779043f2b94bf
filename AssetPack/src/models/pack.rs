//! Per-model packing
//!
//! `source` → `.norm.glb` → texture compression → prune → dedup → quantize,
//! then Draco and Meshopt candidates built from the same intermediate; the
//! smaller one becomes `.packed.glb`. Intermediates alternate between
//! `.tmp1.glb` and `.tmp2.glb` and are removed however the run ends.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use super::normalize::normalize_model;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::tools::{Tool, gltf_transform};
use crate::utils::fs::{file_size, remove_file_quiet};
use crate::utils::{ModelArtifacts, is_fresh};

/// First line of a Git LFS pointer file.
pub const LFS_POINTER_HEADER: &str = "version https://git-lfs.github.com/spec/v1";

/// Geometry codec that produced the packed model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Draco,
    Meshopt,
}

impl Codec {
    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Draco => "draco",
            Codec::Meshopt => "meshopt",
        }
    }
}

/// Sizes recorded for one model, in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetrics {
    pub source: PathBuf,
    pub input: u64,
    pub normalized: u64,
    pub draco: Option<u64>,
    pub meshopt: Option<u64>,
    pub packed: u64,
    pub winner: Option<Codec>,
    /// Embedded WebP textures re-encoded as PNG by normalization.
    pub webp_converted: usize,
    /// The packed output was already up to date.
    pub skipped: bool,
}

impl ModelMetrics {
    /// Size reduction from input to packed output, in percent.
    pub fn savings_percent(&self) -> f64 {
        if self.input == 0 {
            return 0.0;
        }
        (1.0 - self.packed as f64 / self.input as f64) * 100.0
    }
}

/// Whether the file starts with a Git LFS pointer header.
pub fn is_lfs_pointer(path: &Path) -> Result<bool> {
    let mut head = Vec::with_capacity(LFS_POINTER_HEADER.len() + 8);
    File::open(path)?
        .take((LFS_POINTER_HEADER.len() + 8) as u64)
        .read_to_end(&mut head)?;
    let text = String::from_utf8_lossy(&head);
    Ok(text.trim_start().starts_with(LFS_POINTER_HEADER))
}

/// Pack one model. Errors are fatal to this model only.
pub fn pack_model(ctx: &Context, source: &Path, tool: &Tool) -> Result<ModelMetrics> {
    if is_lfs_pointer(source)? {
        return Err(Error::LfsPointer {
            path: source.to_path_buf(),
        });
    }

    let artifacts = ModelArtifacts::for_source(source);
    let normalized = normalize_model(ctx, &artifacts)?;
    let input = normalized.path;

    let mut metrics = ModelMetrics {
        source: source.to_path_buf(),
        input: file_size(source).unwrap_or(0),
        normalized: file_size(&input).unwrap_or(0),
        draco: None,
        meshopt: None,
        packed: 0,
        winner: None,
        webp_converted: normalized.converted,
        skipped: false,
    };

    if !ctx.force && is_fresh(&artifacts.packed, &input) {
        tracing::info!("skip {} (up to date)", ctx.display(source));
        metrics.packed = file_size(&artifacts.packed).unwrap_or(0);
        metrics.skipped = true;
        return Ok(metrics);
    }

    remove_transient(&artifacts);
    let result = run_steps(ctx, tool, &artifacts, &input, &mut metrics);
    remove_transient(&artifacts);
    result?;

    tracing::info!(
        "packed {} -> {} ({:.1}% smaller, {})",
        ctx.display(source),
        ctx.display(&artifacts.packed),
        metrics.savings_percent(),
        metrics.winner.map_or("?", Codec::as_str)
    );
    Ok(metrics)
}

fn run_steps(
    ctx: &Context,
    tool: &Tool,
    artifacts: &ModelArtifacts,
    input: &Path,
    metrics: &mut ModelMetrics,
) -> Result<()> {
    let config = &ctx.config;
    let (a, b) = (artifacts.tmp1.as_path(), artifacts.tmp2.as_path());

    // Mode follows the original path, not the normalized one.
    let mode = ctx.rules.texture_mode(&artifacts.source);
    tool.run(gltf_transform::compress_textures(mode, &config.ktx2, input, a))?;
    tool.run(gltf_transform::prune(a, b))?;
    tool.run(gltf_transform::dedup(b, a))?;

    let (current, spare) = if config.quantize.enabled {
        tool.run(gltf_transform::quantize(&config.quantize, a, b))?;
        (b, a)
    } else {
        (a, b)
    };

    let draco = tool
        .run(gltf_transform::draco(&config.draco, current, spare))
        .map(|()| candidate_size(spare));
    let meshopt = tool
        .run(gltf_transform::meshopt(&config.meshopt, current, &artifacts.meshopt))
        .map(|()| candidate_size(&artifacts.meshopt));

    for (codec, result) in [(Codec::Draco, &draco), (Codec::Meshopt, &meshopt)] {
        if let Err(e) = result {
            tracing::warn!("{} candidate failed for {}: {e}", codec.as_str(), ctx.display(&artifacts.source));
        }
    }
    metrics.draco = draco.ok().flatten();
    metrics.meshopt = meshopt.ok().flatten();

    let winner = pick_smaller(metrics.draco, metrics.meshopt).ok_or_else(|| Error::NoCandidate {
        path: artifacts.source.clone(),
    })?;
    let winner_path = match winner {
        Codec::Draco => spare,
        Codec::Meshopt => artifacts.meshopt.as_path(),
    };
    fs::rename(winner_path, &artifacts.packed)?;
    metrics.winner = Some(winner);
    metrics.packed = file_size(&artifacts.packed).unwrap_or(0);
    Ok(())
}

/// Size of a candidate, `None` when missing or empty.
fn candidate_size(path: &Path) -> Option<u64> {
    file_size(path).filter(|size| *size > 0)
}

/// The smaller valid candidate; Draco wins ties.
pub fn pick_smaller(draco: Option<u64>, meshopt: Option<u64>) -> Option<Codec> {
    match (draco, meshopt) {
        (Some(d), Some(m)) if m < d => Some(Codec::Meshopt),
        (Some(_), _) => Some(Codec::Draco),
        (None, Some(_)) => Some(Codec::Meshopt),
        (None, None) => None,
    }
}

fn remove_transient(artifacts: &ModelArtifacts) {
    for path in artifacts.transient() {
        remove_file_quiet(path);
    }
}
