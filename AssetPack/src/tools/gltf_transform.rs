//! `gltf-transform` argument builders
//!
//! Each operation is file-in/file-out: `gltf-transform <op> <input> <output> [flags]`.

use std::ffi::OsString;
use std::path::Path;

use crate::config::{DracoConfig, Ktx2Config, MeshoptConfig, QuantizeConfig, TextureMode};

/// Vertex attributes quantized when texture coordinates must stay untouched.
const NON_TEXCOORD_ATTRIBUTES: &str = "{POSITION,NORMAL,TANGENT,COLOR_*,JOINTS_*,WEIGHTS_*}";

fn op(name: &str, input: &Path, output: &Path) -> Vec<OsString> {
    vec![name.into(), input.into(), output.into()]
}

fn flag(args: &mut Vec<OsString>, name: &str, value: impl ToString) {
    args.push(name.into());
    args.push(value.to_string().into());
}

/// KTX2 texture compression of every texture in the model.
pub fn compress_textures(mode: TextureMode, params: &Ktx2Config, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = op(mode.as_str(), input, output);
    match mode {
        TextureMode::Uastc => {
            flag(&mut args, "--level", params.uastc_quality);
            flag(&mut args, "--rdo-lambda", params.uastc_rate);
            flag(&mut args, "--zstd", params.zstd_level);
        }
        TextureMode::Etc1s => {
            flag(&mut args, "--quality", params.etc1s_q_level);
            flag(&mut args, "--effort", params.etc1s_effort);
        }
    }
    args
}

pub fn prune(input: &Path, output: &Path) -> Vec<OsString> {
    op("prune", input, output)
}

pub fn dedup(input: &Path, output: &Path) -> Vec<OsString> {
    op("dedup", input, output)
}

pub fn quantize(params: &QuantizeConfig, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = op("quantize", input, output);
    flag(&mut args, "--quantize-position", params.position_bits);
    flag(&mut args, "--quantize-normal", params.normal_bits);
    match params.texcoord_bits {
        Some(bits) => flag(&mut args, "--quantize-texcoord", bits),
        None => flag(&mut args, "--pattern", NON_TEXCOORD_ATTRIBUTES),
    }
    args
}

/// Edgebreaker Draco candidate. Zero bits leaves an attribute unquantized.
pub fn draco(params: &DracoConfig, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = op("draco", input, output);
    flag(&mut args, "--method", "edgebreaker");
    flag(&mut args, "--quantize-position", params.position_bits);
    flag(&mut args, "--quantize-texcoord", params.texcoord_bits.unwrap_or(0));
    args
}

pub fn meshopt(params: &MeshoptConfig, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = op("meshopt", input, output);
    flag(&mut args, "--level", &params.level);
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_etc1s_model_compression_has_no_zstd() {
        let args = strings(compress_textures(
            TextureMode::Etc1s,
            &Ktx2Config::default(),
            Path::new("a.glb"),
            Path::new("b.glb"),
        ));
        assert_eq!(&args[..3], &["etc1s", "a.glb", "b.glb"]);
        assert!(!args.iter().any(|a| a == "--zstd"));
    }

    #[test]
    fn test_quantize_skips_texcoords_when_disabled() {
        let mut params = QuantizeConfig::default();
        params.texcoord_bits = None;
        let args = strings(quantize(&params, Path::new("a.glb"), Path::new("b.glb")));
        assert!(!args.iter().any(|a| a == "--quantize-texcoord"));
        assert!(args.iter().any(|a| a == "--pattern"));
        assert!(!args.iter().any(|a| a.contains("TEXCOORD")));
    }

    #[test]
    fn test_draco_texcoord_bits() {
        let mut params = DracoConfig::default();
        let args = strings(draco(&params, Path::new("a.glb"), Path::new("b.glb")));
        assert!(args.windows(2).any(|w| w[0] == "--quantize-texcoord" && w[1] == "12"));

        params.texcoord_bits = None;
        let args = strings(draco(&params, Path::new("a.glb"), Path::new("b.glb")));
        assert!(args.windows(2).any(|w| w[0] == "--quantize-texcoord" && w[1] == "0"));
        assert!(args.windows(2).any(|w| w[0] == "--method" && w[1] == "edgebreaker"));
    }
}
