//! Compiled path-pattern rules
//!
//! Every inclusion list in the configuration is a list of regular
//! expressions. A path matches a list when any expression matches the
//! absolute path rendered with forward slashes.

use std::path::Path;

use regex::RegexSet;

use super::Config;
use crate::error::{Error, Result};
use crate::utils::fs::slash_path;

/// A compiled inclusion list with "any match" semantics.
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: RegexSet,
}

impl PatternSet {
    /// Compile `patterns`; `field` names the config entry for error reporting.
    pub fn new(field: &'static str, patterns: &[String]) -> Result<Self> {
        let set = RegexSet::new(patterns).map_err(|e| Error::InvalidPattern {
            field,
            message: e.to_string(),
        })?;
        Ok(Self { set })
    }

    /// Whether any pattern matches `path`.
    pub fn is_match(&self, path: &Path) -> bool {
        !self.set.is_empty() && self.set.is_match(&slash_path(path))
    }
}

/// Texture encoding family for KTX2 output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureMode {
    /// Higher quality, supports the zstd supercompression pass.
    Uastc,
    /// Smaller, uses only its own internal compression.
    Etc1s,
}

impl TextureMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TextureMode::Uastc => "uastc",
            TextureMode::Etc1s => "etc1s",
        }
    }
}

/// All pattern lists of a [`Config`], compiled once per run.
#[derive(Debug, Clone)]
pub struct Rules {
    uastc: PatternSet,
    ui: PatternSet,
    no_mipmap: PatternSet,
    yes_mipmap: PatternSet,
    mipmap_default: bool,
}

impl Rules {
    pub fn compile(config: &Config) -> Result<Self> {
        Ok(Self {
            uastc: PatternSet::new("uastc_include", &config.uastc_include)?,
            ui: PatternSet::new("ui_include", &config.ui_include)?,
            no_mipmap: PatternSet::new("textures.no_mipmap_include", &config.textures.no_mipmap_include)?,
            yes_mipmap: PatternSet::new("textures.yes_mipmap_include", &config.textures.yes_mipmap_include)?,
            mipmap_default: config
                .textures
                .gen_mipmap_default
                .unwrap_or(config.ktx2.gen_mipmap),
        })
    }

    /// UASTC for paths matching `uastc_include`, ETC1S otherwise.
    pub fn texture_mode(&self, path: &Path) -> TextureMode {
        if self.uastc.is_match(path) {
            TextureMode::Uastc
        } else {
            TextureMode::Etc1s
        }
    }

    /// Whether AVIF/WebP siblings are produced for this image.
    pub fn is_ui(&self, path: &Path) -> bool {
        self.ui.is_match(path)
    }

    /// Mipmap decision: `yes` list beats `no` list beats the default.
    pub fn gen_mipmap(&self, path: &Path) -> bool {
        if self.yes_mipmap.is_match(path) {
            true
        } else if self.no_mipmap.is_match(path) {
            false
        } else {
            self.mipmap_default
        }
    }
}
