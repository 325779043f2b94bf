//! CLI command for model packing and its size summary

use console::style;

use super::format_size;
use crate::cli::progress::BatchBar;
use crate::context::Context;
use crate::models::{PackBatchResult, pack_models};

/// Pack every model; fails when any model failed.
pub fn execute(ctx: &Context, quiet: bool) -> anyhow::Result<()> {
    let bar = BatchBar::new(quiet);
    let result = pack_models(ctx, |p| bar.update(p))?;
    bar.finish();

    print_summary(ctx, &result);
    check_failures(&result)
}

/// Error out when any model failed.
pub fn check_failures(result: &PackBatchResult) -> anyhow::Result<()> {
    match result.failed_count() {
        0 => Ok(()),
        n => anyhow::bail!("{n} model(s) failed to pack"),
    }
}

/// Print the per-model size table and totals.
pub fn print_summary(ctx: &Context, result: &PackBatchResult) {
    if result.outcomes.is_empty() {
        println!("No models to pack");
        return;
    }

    let optional = |size: Option<u64>| size.map_or_else(|| "-".to_string(), format_size);

    println!();
    println!(
        "{}",
        style(format!(
            "{:<40} {:>11} {:>11} {:>11} {:>11} {:>11} {:>7}  {}",
            "Model", "Input", "Normalized", "Draco", "Meshopt", "Packed", "Saved", "Codec"
        ))
        .bold()
    );
    for metrics in result.metrics() {
        let codec = if metrics.skipped {
            "up to date"
        } else {
            metrics.winner.map_or("-", |c| c.as_str())
        };
        println!(
            "{:<40} {:>11} {:>11} {:>11} {:>11} {:>11} {:>6.1}%  {}",
            ctx.display(&metrics.source),
            format_size(metrics.input),
            format_size(metrics.normalized),
            optional(metrics.draco),
            optional(metrics.meshopt),
            format_size(metrics.packed),
            metrics.savings_percent(),
            codec
        );
    }

    let (input, packed) = result.totals();
    let saved = if input == 0 {
        0.0
    } else {
        (1.0 - packed as f64 / input as f64) * 100.0
    };
    println!(
        "{}",
        style(format!(
            "{:<40} {:>11} {:>11} {:>11} {:>11} {:>11} {:>6.1}%",
            "Total",
            format_size(input),
            "",
            "",
            "",
            format_size(packed),
            saved
        ))
        .bold()
    );

    println!();
    println!("Packing complete:");
    println!("  Packed: {}", result.packed_count());
    println!("  Up to date: {}", result.skipped_count());
    println!("  WebP textures converted: {}", result.webp_converted());
    println!("  Failed: {}", result.failed_count());

    if result.failed_count() > 0 {
        println!();
        println!("Failures:");
        for (source, message) in result.failures() {
            println!("  {}: {message}", ctx.display(source));
        }
    }
}
