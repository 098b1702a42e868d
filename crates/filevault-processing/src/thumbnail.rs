//! Thumbnail derivation
//!
//! A thumbnail is the original image scaled down with Lanczos3 so that neither side exceeds
//! the configured bound, re-encoded in the original's declared format. Deriving is
//! best-effort: every failure is logged and reported as "no thumbnail".

use bytes::Bytes;
use filevault_core::models::IMAGE_MEDIA_TYPES;
use filevault_core::ThumbnailConfig;
use filevault_storage::{collect_stream, ByteStream};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

pub struct ThumbnailDeriver {
    config: ThumbnailConfig,
    max_input_bytes: u64,
}

impl ThumbnailDeriver {
    /// `max_input_bytes` bounds how much of the source stream is buffered for decoding.
    pub fn new(config: ThumbnailConfig, max_input_bytes: u64) -> Self {
        Self {
            config,
            max_input_bytes,
        }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Whether files of this media type get a thumbnail.
    pub fn applies_to(media_type: &str) -> bool {
        output_format(media_type).is_some()
    }

    /// Derive a thumbnail from an image stream.
    ///
    /// Returns `None` without reading the stream for non-image media types, and `None` for
    /// anything that cannot be read, decoded or encoded.
    pub async fn derive(&self, stream: ByteStream, media_type: &str) -> Option<Bytes> {
        let format = output_format(media_type)?;

        let data = match collect_stream(stream, Some(self.max_input_bytes)).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, media_type = %media_type, "Failed to read image for thumbnail");
                return None;
            }
        };

        let config = self.config.clone();
        let start = std::time::Instant::now();
        // Decode and resize are CPU-bound; keep them off the async workers.
        let result = tokio::task::spawn_blocking(move || render(&data, format, &config)).await;

        match result {
            Ok(Ok(thumbnail)) => {
                tracing::debug!(
                    media_type = %media_type,
                    size_bytes = thumbnail.len(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Thumbnail derived"
                );
                Some(thumbnail)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, media_type = %media_type, "Thumbnail generation failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, media_type = %media_type, "Thumbnail task failed");
                None
            }
        }
    }
}

fn output_format(media_type: &str) -> Option<ImageFormat> {
    let normalized = crate::validator::normalize_content_type(media_type);
    if !IMAGE_MEDIA_TYPES.contains(&normalized.as_str()) {
        return None;
    }
    match normalized.as_str() {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/gif" => Some(ImageFormat::Gif),
        "image/webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Decode, bound and re-encode an image synchronously.
pub fn render(
    data: &[u8],
    format: ImageFormat,
    config: &ThumbnailConfig,
) -> Result<Bytes, anyhow::Error> {
    let img = image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;

    let bound = config.max_dimension;
    let (width, height) = img.dimensions();
    let img = if width > bound || height > bound {
        img.resize(bound, bound, FilterType::Lanczos3)
    } else {
        img
    };

    encode(&img, format, config.quality)
}

fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Bytes, anyhow::Error> {
    let mut buffer = Vec::new();

    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            rgb.write_with_encoder(encoder)?;
        }
        ImageFormat::WebP => {
            let (width, height) = img.dimensions();
            let rgba = img.to_rgba8();
            let encoder = webp::Encoder::from_rgba(&rgba, width, height);
            let webp_data = encoder.encode(quality as f32);
            buffer.extend_from_slice(&webp_data);
        }
        ImageFormat::Gif => {
            let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
            rgba.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Gif)?;
        }
        other => {
            img.write_to(&mut Cursor::new(&mut buffer), other)?;
        }
    }

    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn encoded(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 40, 40, 128]),
        ));
        encode(&img, format, 90).unwrap().to_vec()
    }

    fn dimensions_of(data: &[u8]) -> (u32, u32) {
        image::load_from_memory(data).unwrap().dimensions()
    }

    #[test]
    fn test_render_bounds_landscape() {
        let source = encoded(800, 400, ImageFormat::Png);
        let thumb = render(&source, ImageFormat::Png, &ThumbnailConfig::default()).unwrap();
        assert_eq!(dimensions_of(&thumb), (200, 100));
    }

    #[test]
    fn test_render_bounds_portrait() {
        let source = encoded(300, 900, ImageFormat::Png);
        let thumb = render(&source, ImageFormat::Png, &ThumbnailConfig::default()).unwrap();
        let (w, h) = dimensions_of(&thumb);
        assert_eq!(h, 200);
        assert!(w <= 67 && w >= 66);
    }

    #[test]
    fn test_render_never_upscales() {
        let source = encoded(50, 30, ImageFormat::Png);
        let thumb = render(&source, ImageFormat::Png, &ThumbnailConfig::default()).unwrap();
        assert_eq!(dimensions_of(&thumb), (50, 30));
    }

    #[test]
    fn test_render_keeps_declared_format() {
        let config = ThumbnailConfig::default();
        for format in [
            ImageFormat::Png,
            ImageFormat::Jpeg,
            ImageFormat::Gif,
            ImageFormat::WebP,
        ] {
            let source = encoded(400, 400, format);
            let thumb = render(&source, format, &config).unwrap();
            assert_eq!(image::guess_format(&thumb).unwrap(), format);
            let (w, h) = dimensions_of(&thumb);
            assert!(w <= 200 && h <= 200, "{:?} produced {}x{}", format, w, h);
        }
    }

    #[test]
    fn test_render_rejects_corrupt_input() {
        let config = ThumbnailConfig::default();
        assert!(render(b"\x89PNG\r\n\x1a\ngarbage", ImageFormat::Png, &config).is_err());
        assert!(render(b"", ImageFormat::Jpeg, &config).is_err());
    }

    #[test]
    fn test_applies_to() {
        assert!(ThumbnailDeriver::applies_to("image/png"));
        assert!(ThumbnailDeriver::applies_to("IMAGE/JPEG"));
        assert!(ThumbnailDeriver::applies_to("image/webp"));
        assert!(ThumbnailDeriver::applies_to("image/gif"));
        assert!(!ThumbnailDeriver::applies_to("image/svg+xml"));
        assert!(!ThumbnailDeriver::applies_to("application/pdf"));
        assert!(!ThumbnailDeriver::applies_to("text/plain"));
    }
}
