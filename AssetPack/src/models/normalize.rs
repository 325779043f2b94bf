//! Texture normalization: WebP images inside models become PNG
//!
//! The model is unpacked into a per-model scratch directory:
//!
//! ```text
//! robot.norm_work/
//!   scene.gltf        document, buffers and images pointing at the files below
//!   scene.bin         buffer 0 (the GLB BIN chunk)
//!   scene_<n>.bin     any further buffer carrying data
//!   images/<i>.<ext>  every image, named by its index
//! ```
//!
//! WebP images are re-encoded to PNG there and `EXT_texture_webp` is folded
//! back into plain texture sources. Repacking rebuilds buffer 0 view by view,
//! so accessor, image and buffer view indices never move. The scratch
//! directory is removed whether or not the run succeeds.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value, json};

use super::glb::{GlbContainer, is_glb};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::images::encode::png_bytes;
use crate::utils::fs::{extension_lower, remove_dir_all_quiet, write_atomic};
use crate::utils::{ModelArtifacts, is_fresh};

const WEBP_EXTENSION: &str = "EXT_texture_webp";
const MESHOPT_EXTENSION: &str = "EXT_meshopt_compression";
const SCENE_JSON: &str = "scene.gltf";
const IMAGES_DIR: &str = "images";

/// Model file the remaining pack steps read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOutcome {
    pub path: PathBuf,
    /// WebP images converted to PNG in this run.
    pub converted: usize,
}

/// Produce `<stem>.norm.glb` for a model, or hand back the source when
/// normalization is disabled.
pub fn normalize_model(ctx: &Context, artifacts: &ModelArtifacts) -> Result<NormalizeOutcome> {
    if !ctx.config.models.normalize_webp_in_models {
        return Ok(NormalizeOutcome {
            path: artifacts.source.clone(),
            converted: 0,
        });
    }
    if !ctx.force && is_fresh(&artifacts.normalized, &artifacts.source) {
        tracing::debug!("reuse {}", ctx.display(&artifacts.normalized));
        return Ok(NormalizeOutcome {
            path: artifacts.normalized.clone(),
            converted: 0,
        });
    }

    let result = normalize_into(&artifacts.source, &artifacts.scratch_dir, &artifacts.normalized);
    remove_dir_all_quiet(&artifacts.scratch_dir);
    let converted = result?;
    if converted > 0 {
        tracing::info!(
            "normalized {} ({converted} WebP -> PNG)",
            ctx.display(&artifacts.source)
        );
    }
    Ok(NormalizeOutcome {
        path: artifacts.normalized.clone(),
        converted,
    })
}

/// Unpack, edit and repack `source` into `dest`. Returns the number of
/// converted images.
pub fn normalize_into(source: &Path, scratch: &Path, dest: &Path) -> Result<usize> {
    let data = fs::read(source)?;
    let (json, bin) = if is_glb(&data) {
        let container = GlbContainer::from_bytes(source, &data)?;
        if !has_webp(&container.json) {
            write_atomic(dest, |file| Ok(file.write_all(&data)?))?;
            return Ok(0);
        }
        (container.json, container.bin)
    } else {
        let json = serde_json::from_slice(&data).map_err(|e| invalid(source, e.to_string()))?;
        (json, None)
    };

    remove_dir_all_quiet(scratch);
    fs::create_dir_all(scratch.join(IMAGES_DIR))?;
    unpack(source, scratch, json, bin)?;
    let converted = convert_webp_images(scratch)?;
    let container = repack(scratch)?;
    let bytes = container.to_bytes()?;
    write_atomic(dest, |file| Ok(file.write_all(&bytes)?))?;
    Ok(converted)
}

/// Whether any image or texture still refers to WebP.
pub fn has_webp(json: &Value) -> bool {
    let uses_extension = ["extensionsUsed", "extensionsRequired"]
        .iter()
        .filter_map(|key| json.get(key).and_then(Value::as_array))
        .flatten()
        .any(|name| name == WEBP_EXTENSION);
    uses_extension || array(json, "images").iter().any(is_webp_image)
}

fn is_webp_image(image: &Value) -> bool {
    image.get("mimeType").and_then(Value::as_str) == Some("image/webp")
        || image.get("uri").and_then(Value::as_str).is_some_and(|uri| {
            let lower = uri.to_ascii_lowercase();
            lower.starts_with("data:image/webp") || lower.ends_with(".webp")
        })
}

// ==================== Unpack ====================

fn unpack(source: &Path, scratch: &Path, mut json: Value, bin: Option<Vec<u8>>) -> Result<()> {
    let base_dir = source.parent().unwrap_or_else(|| Path::new("."));
    let mut bin = bin;

    let mut buffers: Vec<Option<Vec<u8>>> = Vec::new();
    for (i, buffer) in array(&json, "buffers").iter().enumerate() {
        let data = match buffer.get("uri").and_then(Value::as_str) {
            Some(uri) => Some(read_uri(source, base_dir, uri)?.1),
            None if i == 0 && bin.is_some() => bin.take(),
            None if is_fallback_buffer(buffer) => None,
            None => return Err(invalid(source, format!("buffer {i} has no data"))),
        };
        buffers.push(data);
    }

    let image_count = array(&json, "images").len();
    for i in 0..image_count {
        let image = &json["images"][i];
        let (mime, bytes) = if let Some(uri) = image.get("uri").and_then(Value::as_str) {
            let (mime, bytes) = read_uri(source, base_dir, uri)?;
            (mime.or_else(|| mime_for_ext(&extension_lower(Path::new(uri))?)), bytes)
        } else if let Some(view) = index(image, "bufferView") {
            let bytes = view_bytes(source, &json, &buffers, view)?.to_vec();
            (image.get("mimeType").and_then(Value::as_str).map(String::from), bytes)
        } else {
            return Err(invalid(source, format!("image {i} has neither uri nor bufferView")));
        };

        let image = &mut json["images"][i];
        if let Some(mime) = &mime {
            image["mimeType"] = json!(mime);
        }
        if image.get("uri").is_some() {
            image["uri"] = json!(format!("{IMAGES_DIR}/{i}.{}", ext_for_mime(mime.as_deref())));
        }
        fs::write(image_file(scratch, i, image), bytes)?;
    }

    for (i, data) in buffers.iter().enumerate() {
        let Some(data) = data else { continue };
        let name = buffer_file_name(i);
        fs::write(scratch.join(&name), data)?;
        json["buffers"][i]["uri"] = json!(name);
    }

    fs::write(scratch.join(SCENE_JSON), serde_json::to_vec_pretty(&json)?)?;
    Ok(())
}

fn is_fallback_buffer(buffer: &Value) -> bool {
    buffer
        .pointer(&format!("/extensions/{MESHOPT_EXTENSION}/fallback"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Resolve a `data:` URI or a path relative to the model.
fn read_uri(source: &Path, base_dir: &Path, uri: &str) -> Result<(Option<String>, Vec<u8>)> {
    if let Some(rest) = uri.strip_prefix("data:") {
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| invalid(source, "malformed data URI"))?;
        let mime = header.split(';').next().filter(|m| !m.is_empty()).map(String::from);
        let bytes = if header.ends_with(";base64") {
            BASE64.decode(payload)?
        } else {
            payload.as_bytes().to_vec()
        };
        return Ok((mime, bytes));
    }
    if uri.contains("://") {
        return Err(invalid(source, format!("external URI not supported: {uri}")));
    }
    Ok((None, fs::read(base_dir.join(uri))?))
}

fn view_bytes<'a>(source: &Path, json: &Value, buffers: &'a [Option<Vec<u8>>], view: usize) -> Result<&'a [u8]> {
    let view_json = json
        .get("bufferViews")
        .and_then(|views| views.get(view))
        .ok_or_else(|| invalid(source, format!("bufferView {view} does not exist")))?;
    let buffer = index(view_json, "buffer").unwrap_or(0);
    let data = buffers
        .get(buffer)
        .and_then(Option::as_deref)
        .ok_or_else(|| invalid(source, format!("bufferView {view} points at buffer {buffer} without data")))?;
    byte_range(view_json)
        .and_then(|range| data.get(range))
        .ok_or_else(|| invalid(source, format!("bufferView {view} is out of range")))
}

// ==================== Edit ====================

/// Re-encode WebP images as PNG and drop `EXT_texture_webp`.
fn convert_webp_images(scratch: &Path) -> Result<usize> {
    let mut json = read_scene(scratch)?;
    let mut converted = 0;

    let image_count = array(&json, "images").len();
    for i in 0..image_count {
        let image = &mut json["images"][i];
        let file = image_file(scratch, i, image);
        if !is_webp_image(image) && extension_lower(&file).as_deref() != Some("webp") {
            continue;
        }
        let png = png_bytes(&fs::read(&file)?)?;
        image["mimeType"] = json!("image/png");
        if image.get("uri").is_some() {
            image["uri"] = json!(format!("{IMAGES_DIR}/{i}.png"));
        }
        fs::write(image_file(scratch, i, image), png)?;
        fs::remove_file(&file)?;
        converted += 1;
    }

    fold_webp_textures(&mut json);
    fs::write(scratch.join(SCENE_JSON), serde_json::to_vec_pretty(&json)?)?;
    Ok(converted)
}

/// Point every texture at its WebP source directly and forget the extension.
fn fold_webp_textures(json: &mut Value) {
    if let Some(textures) = json.get_mut("textures").and_then(Value::as_array_mut) {
        for texture in textures {
            let Some(extensions) = texture.get_mut("extensions").and_then(Value::as_object_mut) else {
                continue;
            };
            let Some(ext) = extensions.remove(WEBP_EXTENSION) else {
                continue;
            };
            let now_empty = extensions.is_empty();
            if now_empty {
                if let Some(texture) = texture.as_object_mut() {
                    texture.remove("extensions");
                }
            }
            if let Some(source) = ext.get("source") {
                texture["source"] = source.clone();
            }
        }
    }

    for key in ["extensionsUsed", "extensionsRequired"] {
        let Some(root) = json.as_object_mut() else { return };
        let Some(list) = root.get_mut(key).and_then(Value::as_array_mut) else {
            continue;
        };
        list.retain(|name| name != WEBP_EXTENSION);
        if list.is_empty() {
            root.remove(key);
        }
    }
}

// ==================== Repack ====================

/// Rebuild a GLB from the scratch directory.
fn repack(scratch: &Path) -> Result<GlbContainer> {
    let mut json = read_scene(scratch)?;
    let scene = scratch.join(SCENE_JSON);

    // Buffers that carried data were written to the scratch directory; the
    // rest are meshopt fallbacks and stay data-less.
    let buffers: Vec<Option<Vec<u8>>> = array(&json, "buffers")
        .iter()
        .map(|buffer| match buffer.get("uri").and_then(Value::as_str) {
            Some(uri) => fs::read(scratch.join(uri)).map(Some),
            None => Ok(None),
        })
        .collect::<std::io::Result<_>>()?;

    let mut image_views: HashMap<usize, Vec<u8>> = HashMap::new();
    let mut uri_images: Vec<(usize, Vec<u8>)> = Vec::new();
    for (i, image) in array(&json, "images").iter().enumerate() {
        let bytes = fs::read(image_file(scratch, i, image))?;
        match index(image, "bufferView") {
            Some(view) => {
                image_views.insert(view, bytes);
            }
            None => uri_images.push((i, bytes)),
        }
    }

    let mut bin = Vec::new();
    let mut dataless_views = Vec::new();
    let view_count = array(&json, "bufferViews").len();
    for v in 0..view_count {
        let view = &mut json["bufferViews"][v];
        let buffer = index(view, "buffer").ok_or_else(|| invalid(&scene, format!("bufferView {v} has no buffer")))?;
        match buffers.get(buffer) {
            Some(Some(data)) => {
                let (bytes, residue) = match image_views.get(&v) {
                    Some(image) => (image.as_slice(), 0),
                    None => {
                        let range = byte_range(view)
                            .ok_or_else(|| invalid(&scene, format!("bufferView {v} is out of range")))?;
                        let residue = range.start % 4;
                        let bytes = data
                            .get(range)
                            .ok_or_else(|| invalid(&scene, format!("bufferView {v} is out of range")))?;
                        (bytes, residue)
                    }
                };
                let new_offset = append_aligned(&mut bin, bytes, residue);
                set_range(view, 0, new_offset, bytes.len());
            }
            Some(None) => dataless_views.push((v, buffer)),
            None => return Err(invalid(&scene, format!("bufferView {v} points at missing buffer {buffer}"))),
        }

        if let Some(ext) = view.pointer_mut(&format!("/extensions/{MESHOPT_EXTENSION}")) {
            let source_buffer = index(ext, "buffer").unwrap_or(0);
            if let Some(Some(data)) = buffers.get(source_buffer) {
                let bytes = byte_range(ext)
                    .and_then(|range| data.get(range))
                    .ok_or_else(|| invalid(&scene, format!("meshopt range of bufferView {v} is out of range")))?;
                let residue = index(ext, "byteOffset").unwrap_or(0) % 4;
                let new_offset = append_aligned(&mut bin, bytes, residue);
                set_range(ext, 0, new_offset, bytes.len());
            }
        }
    }

    for (image, bytes) in uri_images {
        let offset = append_aligned(&mut bin, &bytes, 0);
        let views = json
            .as_object_mut()
            .ok_or_else(|| invalid(&scene, "document is not an object"))?
            .entry("bufferViews")
            .or_insert_with(|| json!([]));
        let Some(views) = views.as_array_mut() else {
            return Err(invalid(&scene, "bufferViews is not an array"));
        };
        views.push(json!({"buffer": 0, "byteOffset": offset, "byteLength": bytes.len()}));
        let view = views.len() - 1;

        let image = &mut json["images"][image];
        if let Some(image) = image.as_object_mut() {
            image.remove("uri");
        }
        image["bufferView"] = json!(view);
    }

    // Buffer 0 is the merged BIN chunk; data-less buffers follow it.
    let has_bin = !bin.is_empty();
    let old_buffers = array(&json, "buffers").to_vec();
    let mut new_buffers = Vec::new();
    if has_bin {
        let mut merged = old_buffers
            .first()
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_else(Map::new);
        merged.remove("uri");
        merged.remove("extensions");
        merged.insert("byteLength".into(), json!(bin.len()));
        new_buffers.push(Value::Object(merged));
    }
    let mut remap = HashMap::new();
    for (i, buffer) in old_buffers.into_iter().enumerate() {
        if matches!(buffers.get(i), Some(None)) {
            remap.insert(i, new_buffers.len());
            new_buffers.push(buffer);
        }
    }
    for (v, old) in dataless_views {
        json["bufferViews"][v]["buffer"] = json!(remap[&old]);
    }
    if let Some(root) = json.as_object_mut() {
        if new_buffers.is_empty() {
            root.remove("buffers");
        } else {
            root.insert("buffers".into(), Value::Array(new_buffers));
        }
    }

    Ok(GlbContainer {
        json,
        bin: has_bin.then_some(bin),
    })
}

fn read_scene(scratch: &Path) -> Result<Value> {
    let path = scratch.join(SCENE_JSON);
    let text = fs::read(&path)?;
    serde_json::from_slice(&text).map_err(|e| invalid(&path, format!("unreadable intermediate: {e}")))
}

/// Append `bytes` at the first offset congruent to `residue` mod 4.
fn append_aligned(bin: &mut Vec<u8>, bytes: &[u8], residue: usize) -> usize {
    while bin.len() % 4 != residue {
        bin.push(0);
    }
    let offset = bin.len();
    bin.extend_from_slice(bytes);
    offset
}

fn set_range(target: &mut Value, buffer: usize, offset: usize, length: usize) {
    target["buffer"] = json!(buffer);
    target["byteOffset"] = json!(offset);
    target["byteLength"] = json!(length);
}

// ==================== Helpers ====================

fn array<'a>(json: &'a Value, key: &str) -> &'a [Value] {
    json.get(key).and_then(Value::as_array).map_or(&[], Vec::as_slice)
}

fn index(value: &Value, key: &str) -> Option<usize> {
    usize::try_from(value.get(key)?.as_u64()?).ok()
}

/// `byteOffset..byteOffset + byteLength` of a view or meshopt extension;
/// `None` when either is out of `usize` range.
fn byte_range(value: &Value) -> Option<Range<usize>> {
    let offset = match value.get("byteOffset") {
        Some(_) => index(value, "byteOffset")?,
        None => 0,
    };
    let length = index(value, "byteLength")?;
    Some(offset..offset.checked_add(length)?)
}

fn buffer_file_name(index: usize) -> String {
    if index == 0 {
        "scene.bin".to_string()
    } else {
        format!("scene_{index}.bin")
    }
}

/// Scratch file holding image `index`.
fn image_file(scratch: &Path, index: usize, image: &Value) -> PathBuf {
    match image.get("uri").and_then(Value::as_str) {
        Some(uri) => scratch.join(uri),
        None => {
            let mime = image.get("mimeType").and_then(Value::as_str);
            scratch.join(IMAGES_DIR).join(format!("{index}.{}", ext_for_mime(mime)))
        }
    }
}

fn ext_for_mime(mime: Option<&str>) -> &'static str {
    match mime {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        Some("image/ktx2") => "ktx2",
        Some("image/avif") => "avif",
        _ => "bin",
    }
}

fn mime_for_ext(ext: &str) -> Option<String> {
    let mime = match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "ktx2" => "image/ktx2",
        "avif" => "image/avif",
        _ => return None,
    };
    Some(mime.to_string())
}

fn invalid(path: &Path, message: impl Into<String>) -> Error {
    Error::InvalidGltf {
        path: path.to_path_buf(),
        message: message.into(),
    }
}
