//! `toktx` argument grammar
//!
//! UASTC accepts a zstd supercompression pass (`--zcmp`); ETC1S carries its
//! own compression and rejects it, so the two flag sets never mix.

use std::ffi::OsString;
use std::path::Path;

use crate::config::{Ktx2Config, TextureMode};

/// Arguments for `toktx [options] <output> <input>`.
pub fn toktx_args(
    mode: TextureMode,
    params: &Ktx2Config,
    gen_mipmap: bool,
    output: &Path,
    input: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--t2".into(), "--encode".into(), mode.as_str().into()];
    match mode {
        TextureMode::Uastc => {
            args.extend([
                "--uastc_quality".into(),
                params.uastc_quality.to_string().into(),
                "--uastc_rdo_l".into(),
                params.uastc_rate.to_string().into(),
                "--zcmp".into(),
                params.zstd_level.to_string().into(),
            ]);
        }
        TextureMode::Etc1s => {
            args.extend([
                "--clevel".into(),
                params.etc1s_effort.to_string().into(),
                "--qlevel".into(),
                params.etc1s_q_level.to_string().into(),
            ]);
        }
    }
    if gen_mipmap {
        args.push("--genmipmap".into());
    }
    args.push(output.into());
    args.push(input.into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_uastc_args() {
        let args = toktx_args(
            TextureMode::Uastc,
            &Ktx2Config::default(),
            true,
            Path::new("out.ktx2"),
            Path::new("in.png"),
        );
        assert_eq!(
            strings(&args),
            vec![
                "--t2", "--encode", "uastc", "--uastc_quality", "2", "--uastc_rdo_l", "1",
                "--zcmp", "18", "--genmipmap", "out.ktx2", "in.png",
            ]
        );
    }

    #[test]
    fn test_etc1s_never_requests_zstd() {
        for mipmap in [true, false] {
            let args = strings(&toktx_args(
                TextureMode::Etc1s,
                &Ktx2Config::default(),
                mipmap,
                Path::new("out.ktx2"),
                Path::new("in.png"),
            ));
            assert!(args.contains(&"etc1s".to_string()));
            assert!(!args.iter().any(|a| a == "--zcmp"));
            assert_eq!(args.iter().any(|a| a == "--genmipmap"), mipmap);
            assert_eq!(&args[args.len() - 2..], &["out.ktx2", "in.png"]);
        }
    }
}
