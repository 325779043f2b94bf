//! Pipeline configuration
//!
//! A [`Config`] is loaded once per run and never mutated afterwards. Built-in
//! defaults can be overridden by an `assetpack.toml` in the project root:
//!
//! ```toml
//! img_dirs = ["public/textures", "public/ui"]
//! model_dirs = ["public/models"]
//! uastc_include = ["(?i)/hero_", "(?i)normal"]
//! concurrency = 8
//!
//! [ktx2]
//! etc1s_q_level = 160
//!
//! [draco]
//! texcoord_bits = 0   # 0 disables UV quantization
//! ```
//!
//! Pattern lists are regular expressions matched against the absolute path
//! with forward slashes; see [`patterns`].

pub mod patterns;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use patterns::{PatternSet, Rules, TextureMode};

/// Config file looked up in the project root when none is given explicitly.
pub const CONFIG_FILE_NAME: &str = "assetpack.toml";

/// Default number of files processed in parallel.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Complete pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Roots scanned for raster images (relative to the project root).
    pub img_dirs: Vec<String>,
    /// Roots scanned for `.glb`/`.gltf` models.
    pub model_dirs: Vec<String>,
    /// Directory receiving `duplicates.json`.
    pub report_dir: String,
    /// Images matching any of these are encoded as UASTC, the rest as ETC1S.
    pub uastc_include: Vec<String>,
    /// Images matching any of these also get AVIF and WebP siblings.
    pub ui_include: Vec<String>,
    /// Files processed in parallel within a stage.
    pub concurrency: usize,
    pub ktx2: Ktx2Config,
    pub models: ModelsConfig,
    pub draco: DracoConfig,
    pub quantize: QuantizeConfig,
    pub meshopt: MeshoptConfig,
    pub textures: TexturesConfig,
    pub ui_images: UiImageConfig,
    pub tools: ToolsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            img_dirs: vec!["public/textures".into(), "public/ui".into()],
            model_dirs: vec!["public/models".into()],
            report_dir: "build-reports".into(),
            uastc_include: vec![
                "(?i)/hero_".into(),
                "(?i)normal".into(),
                r"(?i)_n\.(png|jpe?g)$".into(),
            ],
            ui_include: vec!["(?i)/ui/".into(), "(?i)/hud_".into(), "(?i)/icons?/".into()],
            concurrency: DEFAULT_CONCURRENCY,
            ktx2: Ktx2Config::default(),
            models: ModelsConfig::default(),
            draco: DracoConfig::default(),
            quantize: QuantizeConfig::default(),
            meshopt: MeshoptConfig::default(),
            textures: TexturesConfig::default(),
            ui_images: UiImageConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Basis Universal encoder parameters, passed through to the encoders verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ktx2Config {
    /// ETC1S quality level (1-255).
    pub etc1s_q_level: u32,
    /// ETC1S compression effort (0-5).
    pub etc1s_effort: u32,
    /// UASTC rate-distortion lambda.
    pub uastc_rate: f32,
    /// UASTC quality level (0-4).
    pub uastc_quality: u32,
    /// Zstandard supercompression level for UASTC.
    pub zstd_level: u32,
    /// Mipmap fallback when `textures.gen_mipmap_default` is unset.
    pub gen_mipmap: bool,
}

impl Default for Ktx2Config {
    fn default() -> Self {
        Self {
            etc1s_q_level: 128,
            etc1s_effort: 2,
            uastc_rate: 1.0,
            uastc_quality: 2,
            zstd_level: 18,
            gen_mipmap: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Ignore models whose name already contains `.packed`.
    pub skip_packed: bool,
    /// Re-encode embedded WebP textures to PNG before packing.
    pub normalize_webp_in_models: bool,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            skip_packed: true,
            normalize_webp_in_models: true,
        }
    }
}

/// Draco (edgebreaker) candidate parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DracoConfig {
    pub position_bits: u8,
    /// `None` keeps UVs unquantized; needed when UVs leave the 0..1 range.
    #[serde(with = "optional_bits")]
    pub texcoord_bits: Option<u8>,
}

impl Default for DracoConfig {
    fn default() -> Self {
        Self {
            position_bits: 14,
            texcoord_bits: Some(12),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeConfig {
    pub enabled: bool,
    pub position_bits: u8,
    pub normal_bits: u8,
    /// `None` keeps UVs unquantized.
    #[serde(with = "optional_bits")]
    pub texcoord_bits: Option<u8>,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            position_bits: 14,
            normal_bits: 10,
            texcoord_bits: Some(12),
        }
    }
}

/// Meshopt candidate parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshoptConfig {
    /// `medium` or `high`.
    pub level: String,
}

impl Default for MeshoptConfig {
    fn default() -> Self {
        Self {
            level: "medium".into(),
        }
    }
}

/// Mipmap policy: `yes_mipmap_include` overrides `no_mipmap_include`
/// overrides `gen_mipmap_default`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TexturesConfig {
    pub gen_mipmap_default: Option<bool>,
    pub no_mipmap_include: Vec<String>,
    pub yes_mipmap_include: Vec<String>,
}

impl Default for TexturesConfig {
    fn default() -> Self {
        Self {
            gen_mipmap_default: None,
            no_mipmap_include: vec!["(?i)/ui/".into(), "(?i)/hud_".into()],
            yes_mipmap_include: Vec::new(),
        }
    }
}

/// AVIF and WebP sibling encoding for UI images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiImageConfig {
    pub avif_quality: u8,
    /// 1 (slowest, smallest) to 10 (fastest).
    pub avif_speed: u8,
    /// Lossy WebP quality, 0-100.
    pub webp_quality: u8,
}

impl Default for UiImageConfig {
    fn default() -> Self {
        Self {
            avif_quality: 60,
            avif_speed: 6,
            webp_quality: 82,
        }
    }
}

/// External encoder programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub toktx: String,
    pub gltf_transform: String,
    /// Per-invocation timeout; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            toktx: "toktx".into(),
            gltf_transform: "gltf-transform".into(),
            timeout_secs: 600,
        }
    }
}

impl Config {
    /// Load the configuration for a project.
    ///
    /// An explicit `path` must exist. Otherwise `<root>/assetpack.toml` is
    /// used when present, and the built-in defaults when not.
    pub fn load(root: &Path, path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = root.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    tracing::debug!("No {CONFIG_FILE_NAME} in {}, using defaults", root.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let text = fs::read_to_string(&path)?;
        let config = Self::from_toml(&text).map_err(|message| Error::ConfigParseFailed {
            path: path.clone(),
            message,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml(text: &str) -> std::result::Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigSerializeFailed(e.to_string()))
    }

    /// Report directory resolved against the project root.
    pub fn report_path(&self, root: &Path) -> PathBuf {
        root.join(&self.report_dir)
    }
}

/// Bit depths where `0` in TOML means "do not quantize".
mod optional_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(value.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        let bits = u8::deserialize(deserializer)?;
        Ok((bits != 0).then_some(bits))
    }
}

/// Process environment captured once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunEnv {
    /// `PACK_CONCURRENCY`, when it is a positive integer.
    pub concurrency: Option<usize>,
    /// `PACK_FORCE` is truthy.
    pub force: bool,
    /// The CI / opt-out variable that asks for the pipeline to be skipped.
    pub bypass: Option<String>,
}

impl RunEnv {
    pub const CONCURRENCY_VAR: &'static str = "PACK_CONCURRENCY";
    pub const FORCE_VAR: &'static str = "PACK_FORCE";
    pub const BYPASS_VARS: [&'static str; 4] = ["SKIP_ASSET_PIPELINE", "CI", "VERCEL", "NETLIFY"];

    /// Snapshot the current process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let concurrency = lookup(Self::CONCURRENCY_VAR)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0);
        let force = lookup(Self::FORCE_VAR).is_some_and(|v| is_truthy(&v));
        let bypass = Self::BYPASS_VARS
            .iter()
            .find(|key| lookup(key).is_some_and(|v| is_truthy(&v)))
            .map(|key| (*key).to_string());
        Self {
            concurrency,
            force,
            bypass,
        }
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> RunEnv {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        RunEnv::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            model_dirs = ["assets/models"]
            [ktx2]
            zstd_level = 10
            [draco]
            texcoord_bits = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.model_dirs, vec!["assets/models".to_string()]);
        assert_eq!(config.ktx2.zstd_level, 10);
        assert_eq!(config.ktx2.etc1s_q_level, 128);
        assert_eq!(config.draco.texcoord_bits, None);
        assert_eq!(config.draco.position_bits, 14);
        assert_eq!(config.quantize.texcoord_bits, Some(12));
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let text = Config::default().to_toml().unwrap();
        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.img_dirs, Config::default().img_dirs);
        assert_eq!(parsed.draco.texcoord_bits, Some(12));
    }

    #[test]
    fn test_load_reports_bad_file() {
        let temp = tempfile::TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "concurrency = \"many\"").unwrap();
        let err = Config::load(temp.path(), None).unwrap_err();
        assert!(matches!(err, Error::ConfigParseFailed { .. }));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = Config::load(temp.path(), None).unwrap();
        assert_eq!(config.report_dir, "build-reports");
    }

    #[test]
    fn test_env_concurrency() {
        assert_eq!(env_from(&[("PACK_CONCURRENCY", "8")]).concurrency, Some(8));
        assert_eq!(env_from(&[("PACK_CONCURRENCY", "0")]).concurrency, None);
        assert_eq!(env_from(&[("PACK_CONCURRENCY", "-2")]).concurrency, None);
        assert_eq!(env_from(&[("PACK_CONCURRENCY", "lots")]).concurrency, None);
    }

    #[test]
    fn test_env_force_and_bypass() {
        let env = env_from(&[("PACK_FORCE", "1"), ("CI", "true")]);
        assert!(env.force);
        assert_eq!(env.bypass.as_deref(), Some("CI"));

        let env = env_from(&[("PACK_FORCE", "0"), ("CI", "false")]);
        assert!(!env.force);
        assert_eq!(env.bypass, None);
    }
}
