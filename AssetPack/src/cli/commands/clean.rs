//! CLI command for the cleanup sweep

use crate::cleanup::clean;
use crate::context::Context;

/// Sweep scratch directories and temp files. Best-effort, never fails.
pub fn execute(ctx: &Context) -> anyhow::Result<()> {
    let result = clean(ctx);

    if result.total() == 0 {
        println!("Nothing to clean");
        return Ok(());
    }
    println!("Cleanup complete:");
    println!("  Directories removed: {}", result.removed_dirs.len());
    println!("  Files removed: {}", result.removed_files.len());

    Ok(())
}
