//! Raster image conversion
//!
//! For every PNG/JPEG under the image roots:
//! - UI images (matching `ui_include`) get `.avif` and `.webp` siblings,
//!   encoded in-process.
//! - Every image gets a `.ktx2` sibling from `toktx`, UASTC or ETC1S by
//!   `uastc_include`, with the per-file mipmap policy.
//!
//! Each output is skipped while it is at least as new as its source, written
//! through a hidden temp file, and fails independently of the others.

pub mod encode;

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::tools::Tool;
use crate::tools::ktx::toktx_args;
use crate::utils::fs::{extension_lower, file_size, temp_output_for, write_atomic};
use crate::utils::naming::is_inside_scratch_dir;
use crate::utils::{Progress, is_fresh, run_bounded, walk};

/// Source extensions handled by the converter.
pub const SOURCE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// What happened to one derived output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputStatus {
    Written,
    /// Already up to date.
    Fresh,
    /// Not produced for this image (not a UI image, or no encoder).
    NotRequested,
    Failed(String),
}

impl OutputStatus {
    fn from_result(result: Result<bool>) -> Self {
        match result {
            Ok(true) => OutputStatus::Written,
            Ok(false) => OutputStatus::Fresh,
            Err(e) => OutputStatus::Failed(e.to_string()),
        }
    }
}

/// Outputs of a single source image.
#[derive(Debug, Clone)]
pub struct ImageOutcome {
    pub source: PathBuf,
    pub avif: OutputStatus,
    pub webp: OutputStatus,
    pub ktx2: OutputStatus,
}

impl ImageOutcome {
    fn statuses(&self) -> [&OutputStatus; 3] {
        [&self.avif, &self.webp, &self.ktx2]
    }
}

/// Result of a conversion run.
#[derive(Debug, Clone, Default)]
pub struct ImageBatchResult {
    pub outcomes: Vec<ImageOutcome>,
    /// Whether `toktx` was found; without it no KTX2 output is attempted.
    pub ktx2_available: bool,
}

impl ImageBatchResult {
    pub fn written(&self) -> usize {
        self.count(|s| *s == OutputStatus::Written)
    }

    pub fn fresh(&self) -> usize {
        self.count(|s| *s == OutputStatus::Fresh)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutputStatus::Failed(_)))
    }

    /// `(source, output extension, message)` for every failed output.
    pub fn failures(&self) -> Vec<(&Path, &'static str, &str)> {
        let mut failures = Vec::new();
        for outcome in &self.outcomes {
            for (ext, status) in ["avif", "webp", "ktx2"].into_iter().zip(outcome.statuses()) {
                if let OutputStatus::Failed(message) = status {
                    failures.push((outcome.source.as_path(), ext, message.as_str()));
                }
            }
        }
        failures
    }

    fn count(&self, pred: impl Fn(&OutputStatus) -> bool) -> usize {
        self.outcomes
            .iter()
            .flat_map(ImageOutcome::statuses)
            .filter(|s| pred(s))
            .count()
    }
}

/// PNG/JPEG sources under the image roots, each resolved path listed once.
pub fn collect_sources(ctx: &Context) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for root in ctx.image_roots() {
        for path in walk(&root) {
            let is_source = extension_lower(&path).is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.as_str()));
            if !is_source || is_inside_scratch_dir(&path) {
                continue;
            }
            let resolved = path.canonicalize().unwrap_or_else(|_| path.clone());
            if seen.insert(resolved) {
                sources.push(path);
            }
        }
    }
    sources
}

/// Convert every source image with bounded concurrency.
pub fn convert_images<P>(ctx: &Context, progress: P) -> Result<ImageBatchResult>
where
    P: Fn(&Progress) + Send + Sync,
{
    let sources = collect_sources(ctx);
    let toktx = ctx.toktx();
    let ktx2_available = !sources.is_empty() && toktx.is_available();
    if !sources.is_empty() && !ktx2_available {
        tracing::warn!(
            "`{}` not found; skipping KTX2 output for this run",
            toktx.program()
        );
    }
    let toktx = ktx2_available.then_some(&toktx);

    let outcomes = run_bounded(&sources, ctx.concurrency, progress, |source| {
        convert_one(ctx, source, toktx)
    })?;
    Ok(ImageBatchResult {
        outcomes,
        ktx2_available,
    })
}

/// Produce every output for one image. Never fails as a whole.
pub fn convert_one(ctx: &Context, source: &Path, toktx: Option<&Tool>) -> ImageOutcome {
    let mut outcome = ImageOutcome {
        source: source.to_path_buf(),
        avif: OutputStatus::NotRequested,
        webp: OutputStatus::NotRequested,
        ktx2: OutputStatus::NotRequested,
    };

    if ctx.rules.is_ui(source) {
        outcome.avif = OutputStatus::from_result(write_sibling(ctx, source, "avif", |img, out| {
            let ui = &ctx.config.ui_images;
            encode::write_avif(img, ui.avif_quality, ui.avif_speed, out)
        }));
        outcome.webp = OutputStatus::from_result(write_sibling(ctx, source, "webp", |img, out| {
            encode::write_webp(img, ctx.config.ui_images.webp_quality, out)
        }));
    }

    if let Some(toktx) = toktx {
        outcome.ktx2 = OutputStatus::from_result(write_ktx2(ctx, source, toktx));
    }

    for (ext, status) in ["avif", "webp", "ktx2"].into_iter().zip(outcome.statuses()) {
        if let OutputStatus::Failed(message) = status {
            tracing::warn!("{} -> .{ext} failed: {message}", ctx.display(source));
        }
    }
    outcome
}

/// Encode a sibling in-process. Returns `false` when it was already fresh.
fn write_sibling<F>(ctx: &Context, source: &Path, ext: &str, encode: F) -> Result<bool>
where
    F: FnOnce(&image::DynamicImage, &mut Vec<u8>) -> Result<()>,
{
    let dest = source.with_extension(ext);
    if is_fresh(&dest, source) {
        tracing::debug!("skip {} (up to date)", ctx.display(&dest));
        return Ok(false);
    }
    let img = image::open(source)?;
    let mut encoded = Vec::new();
    encode(&img, &mut encoded)?;
    write_atomic(&dest, |file| Ok(file.write_all(&encoded)?))?;
    tracing::info!("wrote {}", ctx.display(&dest));
    Ok(true)
}

/// Run `toktx` into a temp sibling and promote it to `<stem>.ktx2`.
fn write_ktx2(ctx: &Context, source: &Path, toktx: &Tool) -> Result<bool> {
    let dest = source.with_extension("ktx2");
    if is_fresh(&dest, source) {
        tracing::debug!("skip {} (up to date)", ctx.display(&dest));
        return Ok(false);
    }
    let mode = ctx.rules.texture_mode(source);
    let gen_mipmap = ctx.rules.gen_mipmap(source);
    let temp = temp_output_for(&dest)?;

    toktx.run(toktx_args(mode, &ctx.config.ktx2, gen_mipmap, &temp, source))?;
    if file_size(&temp).unwrap_or(0) == 0 {
        return Err(Error::ToolNoOutput {
            tool: toktx.program().to_string(),
            path: dest,
        });
    }
    temp.persist(&dest)?;
    tracing::info!("wrote {} ({})", ctx.display(&dest), mode.as_str());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RunEnv};
    use image::{Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn context(root: &Path) -> Context {
        let mut config = Config::default();
        config.tools.toktx = "assetpack-missing-toktx".into();
        Context::new(root, config, &RunEnv::default()).unwrap()
    }

    fn write_png(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([200, 10, 10])).save(path).unwrap();
    }

    #[test]
    fn test_collect_sources_filters_extensions() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_png(&root.join("public/textures/rock.png"));
        write_png(&root.join("public/ui/hud_icon.png"));
        fs::write(root.join("public/textures/rock.ktx2"), b"k").unwrap();
        fs::write(root.join("public/textures/rock.webp"), b"w").unwrap();

        let sources = collect_sources(&context(root));
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_ui_image_gets_avif_and_webp() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let icon = root.join("public/ui/hud_icon.png");
        let rock = root.join("public/textures/rock.png");
        write_png(&icon);
        write_png(&rock);

        let result = convert_images(&context(root), |_| {}).unwrap();
        assert!(!result.ktx2_available);
        assert_eq!(result.failed(), 0);
        assert_eq!(result.written(), 2);
        assert!(icon.with_extension("avif").exists());
        assert!(icon.with_extension("webp").exists());
        assert!(!rock.with_extension("avif").exists());
        assert!(is_fresh(&icon.with_extension("webp"), &icon));

        let again = convert_images(&context(root), |_| {}).unwrap();
        assert_eq!(again.written(), 0);
        assert_eq!(again.fresh(), 2);
    }

    #[test]
    fn test_webp_sibling_uses_configured_quality() {
        let encode_at = |quality: u8| {
            let temp = TempDir::new().unwrap();
            let icon = temp.path().join("public/ui/icon_noise.png");
            fs::create_dir_all(icon.parent().unwrap()).unwrap();
            RgbImage::from_fn(64, 64, |x, y| {
                let v = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503);
                Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
            })
            .save(&icon)
            .unwrap();

            let mut ctx = context(temp.path());
            ctx.config.ui_images.webp_quality = quality;
            convert_one(&ctx, &icon, None);
            fs::read(icon.with_extension("webp")).unwrap().len()
        };

        assert!(encode_at(5) < encode_at(95));
        assert_eq!(crate::config::Config::default().ui_images.webp_quality, 82);
    }

    #[test]
    fn test_undecodable_source_fails_per_output() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        let broken = root.join("public/ui/hud_broken.png");
        fs::create_dir_all(broken.parent().unwrap()).unwrap();
        fs::write(&broken, b"not a png").unwrap();

        let result = convert_images(&context(root), |_| {}).unwrap();
        assert_eq!(result.failed(), 2);
        assert_eq!(result.failures().len(), 2);
        assert!(!broken.with_extension("avif").exists());
    }
}
