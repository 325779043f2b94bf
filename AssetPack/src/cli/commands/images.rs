//! CLI command for image conversion

use crate::cli::progress::BatchBar;
use crate::context::Context;
use crate::images::{ImageBatchResult, convert_images};

/// Convert every image. Per-file failures are reported, not fatal.
pub fn execute(ctx: &Context, quiet: bool) -> anyhow::Result<()> {
    let bar = BatchBar::new(quiet);
    let result = convert_images(ctx, |p| bar.update(p))?;
    bar.finish();

    print_summary(ctx, &result);
    Ok(())
}

pub fn print_summary(ctx: &Context, result: &ImageBatchResult) {
    println!("Image conversion complete:");
    println!("  Sources: {}", result.outcomes.len());
    println!("  Written: {}", result.written());
    println!("  Up to date: {}", result.fresh());
    println!("  Failed: {}", result.failed());
    if !result.ktx2_available && !result.outcomes.is_empty() {
        println!("  KTX2: skipped (`{}` not found)", ctx.config.tools.toktx);
    }

    let failures = result.failures();
    if !failures.is_empty() {
        println!();
        println!("Failures:");
        for (source, ext, message) in failures {
            println!("  {} (.{ext}): {message}", ctx.display(source));
        }
    }
}
