//! In-process raster encoders
//!
//! AVIF and lossy WebP siblings for UI images, and the lossless PNG re-encode used
//! by model texture normalization.

use std::io::Write;

use image::codecs::avif::AvifEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageEncoder};

use crate::error::{Error, Result};

/// 8-bit RGB or RGBA view of `img`, the layouts every encoder here accepts.
fn to_8bit(img: &DynamicImage) -> DynamicImage {
    if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    }
}

/// Encode as AVIF. `quality` is 1-100, `speed` 1-10.
pub fn write_avif<W: Write>(img: &DynamicImage, quality: u8, speed: u8, out: W) -> Result<()> {
    let img = to_8bit(img);
    let encoder = AvifEncoder::new_with_speed_quality(out, speed.clamp(1, 10), quality.clamp(1, 100));
    encoder.write_image(img.as_bytes(), img.width(), img.height(), img.color().into())?;
    Ok(())
}

/// Encode as lossy WebP. `quality` is 0-100.
pub fn write_webp<W: Write>(img: &DynamicImage, quality: u8, mut out: W) -> Result<()> {
    let img = to_8bit(img);
    let encoder = if img.color().has_alpha() {
        webp::Encoder::from_rgba(img.as_bytes(), img.width(), img.height())
    } else {
        webp::Encoder::from_rgb(img.as_bytes(), img.width(), img.height())
    };
    let encoded = encoder
        .encode_simple(false, f32::from(quality.min(100)))
        .map_err(|e| Error::WebpEncode(format!("{e:?}")))?;
    out.write_all(&encoded)?;
    Ok(())
}

/// Re-encode arbitrary image bytes as PNG with the strongest compression.
pub fn png_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)?;
    let img = to_8bit(&img);
    let mut png = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut png, CompressionType::Best, FilterType::Adaptive);
    encoder.write_image(img.as_bytes(), img.width(), img.height(), img.color().into())?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::webp::WebPEncoder;
    use image::{Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(8, 8, |x, y| {
            Rgba([(x * 30) as u8, (y * 30) as u8, 128, (255 - x * 20) as u8])
        }))
    }

    /// Per-pixel noise, so quality visibly changes the encoded size.
    fn noisy() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, y| {
            let v = x.wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503)) >> 7;
            image::Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
        }))
    }

    #[test]
    fn test_webp_quality_controls_size() {
        let mut low = Vec::new();
        let mut high = Vec::new();
        write_webp(&noisy(), 10, &mut low).unwrap();
        write_webp(&noisy(), 95, &mut high).unwrap();

        assert_eq!(&low[..4], b"RIFF");
        assert_eq!(&low[8..12], b"WEBP");
        assert!(low.len() < high.len());
        let decoded = image::load_from_memory(&high).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn test_webp_keeps_alpha() {
        let mut webp = Vec::new();
        write_webp(&sample(), 82, &mut webp).unwrap();
        assert!(image::load_from_memory(&webp).unwrap().color().has_alpha());
    }

    #[test]
    fn test_webp_to_png_keeps_pixels() {
        let rgba = sample().to_rgba8();
        let mut webp = Vec::new();
        WebPEncoder::new_lossless(&mut webp)
            .write_image(rgba.as_raw(), 8, 8, image::ExtendedColorType::Rgba8)
            .unwrap();

        let png = png_bytes(&webp).unwrap();
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded, sample().to_rgba8());
    }

    #[test]
    fn test_avif_output_has_ftyp_box() {
        let mut avif = Vec::new();
        write_avif(&sample(), 60, 10, &mut avif).unwrap();
        assert_eq!(&avif[4..8], b"ftyp");
    }
}
