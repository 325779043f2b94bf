//! AssetPack CLI - Asset build pipeline for glTF models and textures

fn main() -> anyhow::Result<()> {
    assetpack::cli::run_cli()
}
