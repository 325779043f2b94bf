//! CLI command for the duplicate scan

use crate::cli::progress::BatchBar;
use crate::context::Context;
use crate::duplicates::scan_duplicates;

pub fn execute(ctx: &Context, hardlink: bool, quiet: bool) -> anyhow::Result<()> {
    let bar = BatchBar::new(quiet);
    let scan = scan_duplicates(ctx, hardlink, |p| bar.update(p))?;
    bar.finish();

    println!("Scanned {} files", scan.files_scanned);
    if scan.groups.is_empty() {
        println!("No duplicates found");
    } else {
        println!(
            "Found {} duplicate groups ({} redundant files):",
            scan.groups.len(),
            scan.redundant_files()
        );
        for group in &scan.groups {
            let names: Vec<String> = group.iter().map(|p| ctx.display(p)).collect();
            println!("  {}", names.join("  =  "));
        }
    }
    if hardlink {
        println!();
        println!("Hardlinks:");
        println!("  Created: {}", scan.linked);
        println!("  Already linked: {}", scan.already_linked);
        println!("  Failed: {}", scan.link_failures);
    }
    println!("Report: {}", ctx.display(&scan.report_path));

    Ok(())
}
