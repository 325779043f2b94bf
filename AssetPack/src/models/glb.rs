//! GLB container reading and writing
//!
//! Layout: 12-byte header (`glTF`, version 2, total length), a JSON chunk
//! padded with spaces, then an optional BIN chunk padded with zeros. Chunk
//! lengths are multiples of 4.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

/// A parsed GLB: the glTF document and the embedded binary buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct GlbContainer {
    pub json: Value,
    pub bin: Option<Vec<u8>>,
}

impl GlbContainer {
    pub fn read(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Self::from_bytes(path, &data)
    }

    /// Parse GLB bytes; `path` is only used in error messages.
    pub fn from_bytes(path: &Path, data: &[u8]) -> Result<Self> {
        let glb = gltf::Glb::from_slice(data).map_err(|e| Error::InvalidGlb {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let json = serde_json::from_slice(&glb.json).map_err(|e| Error::InvalidGltf {
            path: path.to_path_buf(),
            message: format!("JSON chunk: {e}"),
        })?;
        Ok(Self {
            json,
            bin: glb.bin.map(|bin| bin.into_owned()),
        })
    }

    /// Serialize to GLB bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(&self.json)?;
        let json_padding = padding(json.len());
        let json_chunk_len = json.len() + json_padding;

        let bin_chunk_len = self.bin.as_ref().map(|bin| bin.len() + padding(bin.len()));
        let total_len = 12 + 8 + json_chunk_len + bin_chunk_len.map_or(0, |len| 8 + len);

        let mut output = Vec::with_capacity(total_len);

        // Header
        output.extend_from_slice(GLB_MAGIC);
        output.extend_from_slice(&GLB_VERSION.to_le_bytes());
        output.extend_from_slice(&(total_len as u32).to_le_bytes());

        // JSON chunk
        output.extend_from_slice(&(json_chunk_len as u32).to_le_bytes());
        output.extend_from_slice(&CHUNK_JSON.to_le_bytes());
        output.extend_from_slice(&json);
        output.resize(output.len() + json_padding, b' ');

        // Binary chunk
        if let (Some(bin), Some(len)) = (&self.bin, bin_chunk_len) {
            output.extend_from_slice(&(len as u32).to_le_bytes());
            output.extend_from_slice(&CHUNK_BIN.to_le_bytes());
            output.extend_from_slice(bin);
            output.resize(output.len() + padding(bin.len()), 0);
        }

        Ok(output)
    }
}

/// Whether `data` starts with the GLB magic.
pub fn is_glb(data: &[u8]) -> bool {
    data.starts_with(GLB_MAGIC)
}

fn padding(len: usize) -> usize {
    (4 - (len % 4)) % 4
}
