//! CLI command printing the effective configuration

use crate::context::Context;

pub fn execute(ctx: &Context) -> anyhow::Result<()> {
    print!("{}", ctx.config.to_toml()?);
    println!();
    println!("# effective concurrency: {}", ctx.concurrency);
    Ok(())
}
