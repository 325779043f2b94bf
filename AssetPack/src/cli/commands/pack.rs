//! CLI command for the full pipeline

use std::time::Instant;

use crate::cli::GlobalArgs;
use crate::cli::progress::{BatchBar, print_done, print_step, stage_emoji};
use crate::config::RunEnv;
use crate::pipeline::{PipelineOptions, PipelineOutcome, Stage, run_pipeline};

use super::{finalize, images, models};

pub fn execute(global: &GlobalArgs, env: &RunEnv, force: bool, hardlink: bool) -> anyhow::Result<()> {
    if let Some(variable) = &env.bypass {
        println!("{variable} is set, skipping the asset pipeline");
        return Ok(());
    }

    let ctx = global.context(env)?.with_force(force);
    let started = Instant::now();
    let bar = BatchBar::new(global.quiet);
    let total = Stage::ALL.len();

    let outcome = run_pipeline(
        &ctx,
        env,
        PipelineOptions { hardlink },
        |stage| {
            bar.finish();
            print_step(stage.number(), total, stage_emoji(stage), stage.description());
        },
        |_, progress| bar.update(progress),
    )?;
    bar.finish();

    let report = match outcome {
        PipelineOutcome::Bypassed { variable } => {
            println!("{variable} is set, skipping the asset pipeline");
            return Ok(());
        }
        PipelineOutcome::Completed(report) => report,
    };

    println!();
    println!(
        "Cleaned {} directories and {} files",
        report.cleanup.removed_dirs.len(),
        report.cleanup.removed_files.len()
    );
    println!(
        "Duplicates: {} groups across {} files",
        report.duplicates.groups.len(),
        report.duplicates.files_scanned
    );
    if hardlink {
        println!(
            "Hardlinks: {} created, {} already linked, {} failed",
            report.duplicates.linked, report.duplicates.already_linked, report.duplicates.link_failures
        );
    }
    images::print_summary(&ctx, &report.images);
    models::print_summary(&ctx, &report.models);
    finalize::print_summary(&report.finalize);

    println!();
    print_done(started.elapsed());

    models::check_failures(&report.models)
}
