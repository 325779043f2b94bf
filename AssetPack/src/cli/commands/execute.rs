//! Command execution implementations

use super::Commands;
use super::{clean, config, duplicates, finalize, images, models, pack};
use crate::cli::GlobalArgs;
use crate::config::RunEnv;

impl Commands {
    /// Execute the selected command.
    ///
    /// # Errors
    /// Returns an error if the underlying stage fails, or if any model failed
    /// to pack.
    pub fn execute(&self, global: &GlobalArgs) -> anyhow::Result<()> {
        let env = RunEnv::from_env();
        match self {
            Commands::Clean => clean::execute(&global.context(&env)?),
            Commands::ScanDuplicates { hardlink } => {
                duplicates::execute(&global.context(&env)?, *hardlink, global.quiet)
            }
            Commands::ConvertImages => images::execute(&global.context(&env)?, global.quiet),
            Commands::PackGltf { force } => {
                models::execute(&global.context(&env)?.with_force(*force), global.quiet)
            }
            Commands::FinalizeModels => finalize::execute(&global.context(&env)?),
            Commands::Pack { force, hardlink } => pack::execute(global, &env, *force, *hardlink),
            Commands::Config => config::execute(&global.context(&env)?),
        }
    }
}
