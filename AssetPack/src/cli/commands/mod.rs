use clap::Subcommand;

pub mod clean;
pub mod config;
pub mod duplicates;
pub mod execute;
pub mod finalize;
pub mod images;
pub mod models;
pub mod pack;

#[derive(Subcommand)]
pub enum Commands {
    /// Remove scratch directories and temp files left by interrupted runs
    Clean,

    /// Hash images and report duplicate groups
    ScanDuplicates {
        /// Replace every duplicate with a hardlink to the first file of its group
        #[arg(long)]
        hardlink: bool,
    },

    /// Produce AVIF/WebP siblings for UI images and KTX2 textures for all images
    ConvertImages,

    /// Pack every glTF/GLB model into a `.packed.glb`
    PackGltf {
        /// Rebuild even when the packed output is up to date (same as PACK_FORCE=1)
        #[arg(short, long)]
        force: bool,
    },

    /// Replace originals with their packed outputs and remove intermediates
    FinalizeModels,

    /// Run the whole pipeline: clean, duplicates, images, models, finalize
    Pack {
        /// Rebuild models even when the packed output is up to date
        #[arg(short, long)]
        force: bool,

        /// Hardlink duplicate images during the scan
        #[arg(long)]
        hardlink: bool,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Format byte size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
