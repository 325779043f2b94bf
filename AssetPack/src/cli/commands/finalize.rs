//! CLI command for promoting packed models

use crate::context::Context;
use crate::finalize::{FinalizeResult, finalize_models};

pub fn execute(ctx: &Context) -> anyhow::Result<()> {
    let result = finalize_models(ctx);
    print_summary(&result);
    Ok(())
}

pub fn print_summary(result: &FinalizeResult) {
    println!("Finalize complete:");
    println!("  Promoted: {}", result.promoted.len());
    println!("  Normalized files removed: {}", result.removed_normalized);
    println!("  Scratch directories removed: {}", result.removed_scratch_dirs);
    if result.failures > 0 {
        println!("  Failed: {}", result.failures);
    }
}
