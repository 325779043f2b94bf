//! Per-run context shared by all stages

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{Config, Rules, RunEnv};
use crate::error::Result;
use crate::tools::Tool;
use crate::utils::find_existing_roots;

/// Project root, immutable configuration and the run's effective options.
#[derive(Debug, Clone)]
pub struct Context {
    pub root: PathBuf,
    pub config: Config,
    pub rules: Rules,
    /// Files processed in parallel (CLI flag > `PACK_CONCURRENCY` > config).
    pub concurrency: usize,
    /// Rebuild packed models even when they are up to date.
    pub force: bool,
}

impl Context {
    /// Compile the configuration's rules and apply environment overrides.
    pub fn new(root: impl Into<PathBuf>, config: Config, env: &RunEnv) -> Result<Self> {
        let rules = Rules::compile(&config)?;
        let concurrency = env.concurrency.unwrap_or(config.concurrency).max(1);
        Ok(Self {
            root: root.into(),
            rules,
            concurrency,
            force: env.force,
            config,
        })
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: Option<usize>) -> Self {
        if let Some(n) = concurrency.filter(|n| *n > 0) {
            self.concurrency = n;
        }
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force |= force;
        self
    }

    /// Existing image roots.
    pub fn image_roots(&self) -> Vec<PathBuf> {
        find_existing_roots(&self.root, &self.config.img_dirs)
    }

    /// Existing model roots.
    pub fn model_roots(&self) -> Vec<PathBuf> {
        find_existing_roots(&self.root, &self.config.model_dirs)
    }

    /// Image and model roots together, without repeats.
    pub fn all_roots(&self) -> Vec<PathBuf> {
        let mut roots = self.image_roots();
        for root in self.model_roots() {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    pub fn toktx(&self) -> Tool {
        Tool::new(&self.config.tools.toktx, self.tool_timeout())
    }

    pub fn gltf_transform(&self) -> Tool {
        Tool::new(&self.config.tools.gltf_transform, self.tool_timeout())
    }

    fn tool_timeout(&self) -> Option<Duration> {
        match self.config.tools.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Path relative to the project root, for logs and reports.
    pub fn display(&self, path: &Path) -> String {
        crate::utils::rel(&self.root, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_precedence() {
        let mut config = Config::default();
        config.concurrency = 2;

        let ctx = Context::new("/p", config.clone(), &RunEnv::default()).unwrap();
        assert_eq!(ctx.concurrency, 2);

        let env = RunEnv {
            concurrency: Some(6),
            ..RunEnv::default()
        };
        let ctx = Context::new("/p", config, &env).unwrap();
        assert_eq!(ctx.concurrency, 6);
        assert_eq!(ctx.clone().with_concurrency(Some(9)).concurrency, 9);
        assert_eq!(ctx.with_concurrency(Some(0)).concurrency, 6);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let mut config = Config::default();
        config.tools.timeout_secs = 0;
        let ctx = Context::new("/p", config, &RunEnv::default()).unwrap();
        assert_eq!(ctx.tool_timeout(), None);
    }
}
