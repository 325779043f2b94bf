//! # AssetPack
//!
//! Build pipeline that prepares textures and glTF models for VRAM-constrained
//! web delivery.
//!
//! ## Stages
//!
//! - **Cleanup** - removes scratch directories and temp files left by interrupted runs
//! - **Duplicates** - hashes images, writes `duplicates.json`, optionally hardlinks copies
//! - **Images** - AVIF/WebP siblings for UI images, KTX2 (UASTC or ETC1S) via `toktx`
//! - **Models** - WebP → PNG normalization, texture compression, prune/dedup/quantize,
//!   best-of Draco and Meshopt via `gltf-transform`
//! - **Finalize** - promotes `.packed.glb` outputs over their originals
//!
//! Stages communicate only through the filesystem; every derived artifact sits
//! next to its source under a suffix owned by exactly one stage.
//!
//! ## Quick Start
//!
//! ```no_run
//! use assetpack::prelude::*;
//!
//! let env = RunEnv::from_env();
//! let config = Config::load(std::path::Path::new("."), None)?;
//! let ctx = Context::new(".", config, &env)?;
//!
//! match run_pipeline(&ctx, &env, PipelineOptions::default(), |_| {}, |_, _| {})? {
//!     PipelineOutcome::Bypassed { variable } => println!("skipped ({variable})"),
//!     PipelineOutcome::Completed(report) => {
//!         println!("packed {} models", report.models.packed_count());
//!     }
//! }
//! # Ok::<(), assetpack::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `assetpack` command-line binary

pub mod cleanup;
pub mod config;
pub mod context;
pub mod duplicates;
pub mod error;
pub mod finalize;
pub mod images;
pub mod models;
pub mod pipeline;
pub mod tools;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::cleanup::{CleanupResult, clean};
    pub use crate::config::{Config, RunEnv, TextureMode};
    pub use crate::context::Context;
    pub use crate::duplicates::{DuplicateReport, DuplicateScan, scan_duplicates};
    pub use crate::error::{Error, Result};
    pub use crate::finalize::{FinalizeResult, finalize_models};
    pub use crate::images::{ImageBatchResult, convert_images};
    pub use crate::models::{Codec, ModelMetrics, PackBatchResult, pack_models};
    pub use crate::pipeline::{PipelineOptions, PipelineOutcome, PipelineReport, Stage, run_pipeline};
    pub use crate::utils::Progress;
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
