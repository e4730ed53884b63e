//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `ImageReader::into_dimensions` (header only) |
//! | Decode (JPEG, PNG, GIF) | `image` decoders via `ImageReader::into_decoder`, first frame only |
//! | Orientation | `Orientation::from_exif_chunk` + `DynamicImage::apply_orientation` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG / GIF | `DynamicImage::write_to` |
//! | Metadata | [`exif`](super::exif) (orientation reset + `img-parts` splice) |

use super::backend::{BackendError, Dimensions, ImageBackend, SourceImage};
use super::exif::{attach_metadata, reset_orientation};
use super::params::{CanonicalFormat, Quality, RenderParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn failed(step: &str, path: &Path, e: impl std::fmt::Display) -> BackendError {
    BackendError::ProcessingFailed(format!("Failed to {step} {}: {e}", path.display()))
}

/// Encode pixels in the given format. JPEG drops any alpha channel.
fn encode(img: &DynamicImage, format: CanonicalFormat, quality: Quality) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let result = match format {
        CanonicalFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.as_u8());
            DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)
        }
        CanonicalFormat::Png => img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png),
        CanonicalFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Gif),
    };
    result.map_err(|e| {
        BackendError::ProcessingFailed(format!("{} encode failed: {e}", format.mime_type()))
    })?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| failed("read dimensions of", path, e))?;
        Ok(Dimensions { width, height })
    }

    fn decode(&self, path: &Path) -> Result<SourceImage, BackendError> {
        let mut decoder = ImageReader::open(path)?
            .with_guessed_format()?
            .into_decoder()
            .map_err(|e| failed("open", path, e))?;

        let icc_profile = decoder
            .icc_profile()
            .map_err(|e| failed("read ICC profile of", path, e))?;
        let mut exif = decoder
            .exif_metadata()
            .map_err(|e| failed("read EXIF of", path, e))?;

        let orientation = exif
            .as_deref()
            .and_then(Orientation::from_exif_chunk)
            .unwrap_or(Orientation::NoTransforms);

        // Multi-frame decoders yield their first frame through ImageDecoder
        let mut pixels =
            DynamicImage::from_decoder(decoder).map_err(|e| failed("decode", path, e))?;
        pixels.apply_orientation(orientation);

        if let Some(raw) = exif.as_mut() {
            reset_orientation(raw);
        }

        Ok(SourceImage {
            pixels,
            exif,
            icc_profile,
        })
    }

    fn render(&self, source: &SourceImage, params: &RenderParams) -> Result<Vec<u8>, BackendError> {
        let target = params.target;
        let resized;
        let img = if target == source.dimensions() {
            &source.pixels
        } else {
            // Target is already aspect-planned, so exact resize is contain-fit
            resized = source
                .pixels
                .resize_exact(target.width, target.height, FilterType::Lanczos3);
            &resized
        };

        let encoded = encode(img, params.format, params.quality)?;

        if params.keep_metadata && params.format.supports_metadata() {
            attach_metadata(
                encoded,
                params.format,
                source.exif.as_deref(),
                source.icc_profile.as_deref(),
            )
        } else {
            Ok(encoded)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        create_test_gif, create_test_jpeg, create_test_png, jpeg_bytes, with_exif_orientation,
    };
    use image::{AnimationDecoder, GenericImageView, Rgba};
    use img_parts::ImageEXIF;

    fn render_params(width: u32, height: u32, format: CanonicalFormat) -> RenderParams {
        RenderParams {
            target: Dimensions::new(width, height),
            format,
            quality: Quality::default(),
            keep_metadata: false,
        }
    }

    #[test]
    fn identify_synthetic_jpeg() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("test.jpg");
        create_test_jpeg(&path, 200, 150);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions::new(200, 150));
    }

    #[test]
    fn identify_ignores_misleading_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("actually-png.gif");
        create_test_png(&path, 30, 10);

        let dims = RustBackend::new().identify(&path).unwrap();
        assert_eq!(dims, Dimensions::new(30, 10));
    }

    #[test]
    fn identify_nonexistent_file_errors() {
        let result = RustBackend::new().identify(Path::new("/nonexistent/image.jpg"));
        assert!(result.is_err());
    }

    #[test]
    fn decode_garbage_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nthen nothing useful").unwrap();

        assert!(RustBackend::new().decode(&path).is_err());
    }

    #[test]
    fn decode_applies_rotate90_orientation() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rotated.jpg");
        std::fs::write(&path, with_exif_orientation(jpeg_bytes(40, 20), 6)).unwrap();

        let source = RustBackend::new().decode(&path).unwrap();
        assert_eq!(source.dimensions(), Dimensions::new(20, 40));

        let exif = source.exif.expect("exif kept on the source");
        assert_eq!(
            Orientation::from_exif_chunk(&exif),
            Some(Orientation::NoTransforms)
        );
    }

    #[test]
    fn decode_mirror_orientation_keeps_size() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("mirrored.jpg");
        std::fs::write(&path, with_exif_orientation(jpeg_bytes(40, 20), 2)).unwrap();

        let source = RustBackend::new().decode(&path).unwrap();
        assert_eq!(source.dimensions(), Dimensions::new(40, 20));
    }

    /// 64x32 JPEG, black except for a red 16x16 block in the top-left corner.
    fn marked_jpeg() -> Vec<u8> {
        let img = image::RgbImage::from_fn(64, 32, |x, y| {
            if x < 16 && y < 16 {
                image::Rgb([255, 0, 0])
            } else {
                image::Rgb([0, 0, 0])
            }
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 95))
            .unwrap();
        buf
    }

    #[test]
    fn decode_normalizes_every_orientation() {
        // Orientation tag -> (dimensions, corner the red block ends up in)
        let cases = [
            (1, (64, 32), "top-left"),
            (2, (64, 32), "top-right"),
            (3, (64, 32), "bottom-right"),
            (4, (64, 32), "bottom-left"),
            (5, (32, 64), "top-left"),
            (6, (32, 64), "top-right"),
            (7, (32, 64), "bottom-right"),
            (8, (32, 64), "bottom-left"),
        ];
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = RustBackend::new();

        for (orientation, (w, h), marked) in cases {
            let path = tmp.path().join(format!("orientation-{orientation}.jpg"));
            std::fs::write(&path, with_exif_orientation(marked_jpeg(), orientation)).unwrap();

            let source = backend.decode(&path).unwrap();
            assert_eq!(
                source.dimensions(),
                Dimensions::new(w, h),
                "orientation {orientation}"
            );

            let corners = [
                ("top-left", 4, 4),
                ("top-right", w - 5, 4),
                ("bottom-left", 4, h - 5),
                ("bottom-right", w - 5, h - 5),
            ];
            for (name, x, y) in corners {
                let Rgba([r, g, _, _]) = source.pixels.get_pixel(x, y);
                let is_red = r > 180 && g < 80;
                assert_eq!(
                    is_red,
                    name == marked,
                    "orientation {orientation}: {name} corner is rgb({r}, {g}, _)"
                );
            }

            let exif = source.exif.expect("exif kept on the source");
            assert_eq!(
                Orientation::from_exif_chunk(&exif),
                Some(Orientation::NoTransforms),
                "orientation {orientation}"
            );
        }
    }

    #[test]
    fn decode_gif_keeps_first_frame_only() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("anim.gif");
        create_test_gif(&path, 12, 12, &[[255, 0, 0, 255], [0, 0, 255, 255]]);

        let backend = RustBackend::new();
        let source = backend.decode(&path).unwrap();
        let Rgba([r, _, b, _]) = source.pixels.get_pixel(6, 6);
        assert!(r > 200 && b < 50, "expected the red first frame");

        let encoded = backend
            .render(&source, &render_params(12, 12, CanonicalFormat::Gif))
            .unwrap();
        let frames = image::codecs::gif::GifDecoder::new(Cursor::new(encoded))
            .unwrap()
            .into_frames()
            .count();
        assert_eq!(frames, 1);
    }

    #[test]
    fn render_resizes_to_exact_target() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.png");
        create_test_png(&path, 400, 300);

        let backend = RustBackend::new();
        let source = backend.decode(&path).unwrap();
        let encoded = backend
            .render(&source, &render_params(200, 150, CanonicalFormat::Png))
            .unwrap();

        let out = image::load_from_memory(&encoded).unwrap();
        assert_eq!(out.dimensions(), (200, 150));
    }

    #[test]
    fn render_same_size_still_encodes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("source.jpg");
        create_test_jpeg(&path, 64, 48);

        let backend = RustBackend::new();
        let source = backend.decode(&path).unwrap();
        let encoded = backend
            .render(&source, &render_params(64, 48, CanonicalFormat::Jpeg))
            .unwrap();

        assert_eq!(image::guess_format(&encoded).unwrap(), ImageFormat::Jpeg);
        assert_eq!(image::load_from_memory(&encoded).unwrap().dimensions(), (64, 48));
    }

    #[test]
    fn render_jpeg_from_alpha_source() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("alpha.png");
        create_test_png(&path, 20, 20);

        let backend = RustBackend::new();
        let source = backend.decode(&path).unwrap();
        let source = SourceImage {
            pixels: DynamicImage::ImageRgba8(source.pixels.to_rgba8()),
            ..source
        };
        assert!(backend
            .render(&source, &render_params(10, 10, CanonicalFormat::Jpeg))
            .is_ok());
    }

    #[test]
    fn render_keeps_or_strips_exif() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("rotated.jpg");
        std::fs::write(&path, with_exif_orientation(jpeg_bytes(40, 20), 6)).unwrap();

        let backend = RustBackend::new();
        let source = backend.decode(&path).unwrap();

        let mut params = render_params(10, 20, CanonicalFormat::Jpeg);
        params.keep_metadata = true;
        let kept = backend.render(&source, &params).unwrap();
        let exif = img_parts::jpeg::Jpeg::from_bytes(kept.into())
            .unwrap()
            .exif()
            .expect("exif re-attached");
        assert_eq!(
            Orientation::from_exif_chunk(&exif),
            Some(Orientation::NoTransforms)
        );

        params.keep_metadata = false;
        let stripped = backend.render(&source, &params).unwrap();
        let parsed = img_parts::jpeg::Jpeg::from_bytes(stripped.into()).unwrap();
        assert!(parsed.exif().is_none());
    }
}
