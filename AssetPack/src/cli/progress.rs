//! CLI progress display utilities
//!
//! Step lines with emoji (`[2/5] 🔍 Scanning duplicates`) for the pipeline,
//! and one progress bar per batch stage.

use std::sync::Mutex;
use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

use crate::pipeline::Stage;
use crate::utils::Progress;

/// Broom - for cleanup
pub static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "");
/// Magnifying glass - for scanning operations
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Picture - for texture/image operations
pub static PICTURE: Emoji<'_, '_> = Emoji("🖼️  ", "");
/// Package - for model packing
pub static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
/// Truck - for promotion of packed outputs
pub static TRUCK: Emoji<'_, '_> = Emoji("🚚 ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

/// Emoji shown next to a pipeline stage.
pub fn stage_emoji(stage: Stage) -> &'static Emoji<'static, 'static> {
    match stage {
        Stage::Clean => &BROOM,
        Stage::ScanDuplicates => &LOOKING_GLASS,
        Stage::ConvertImages => &PICTURE,
        Stage::PackModels => &PACKAGE,
        Stage::Finalize => &TRUCK,
    }
}

/// Print a step indicator: `[1/3] 📦 Message...`
pub fn print_step(current: usize, total: usize, emoji: &Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Progress bar style for determinate progress
///
/// Format: `hero_x.png [████████░░░░░░░░] 5/10`
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg:30!} [{bar:40.cyan/blue}] {pos}/{len}")
        .expect("valid template")
        .progress_chars("##-")
}

/// Progress bar fed by batch [`Progress`] callbacks.
///
/// The bar is created on the first update, once the batch size is known, and
/// never drawn when `quiet` is set.
pub struct BatchBar {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl BatchBar {
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    pub fn update(&self, progress: &Progress) {
        if self.quiet {
            return;
        }
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        let bar = slot.get_or_insert_with(|| {
            let pb = ProgressBar::new(progress.total as u64);
            pb.set_style(bar_style());
            pb
        });
        bar.set_position(progress.current as u64);
        let name = std::path::Path::new(&progress.item)
            .file_name()
            .map_or_else(|| progress.item.clone(), |n| n.to_string_lossy().to_string());
        bar.set_message(name);
    }

    /// Clear the current bar so the next batch starts a fresh one.
    pub fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}
