//! EXIF orientation rewriting and metadata re-attachment.
//!
//! The `image` encoders write bare pixel data, so a re-encoded file carries
//! no metadata at all. When metadata is kept, the source's EXIF block and
//! ICC profile are spliced back into the encoded JPEG/PNG with `img-parts`.
//! Because orientation has already been baked into the pixels, the EXIF
//! orientation tag (0x0112) is rewritten to `1` first so viewers never rotate
//! a second time.
//!
//! The EXIF block handled here is the raw TIFF structure (no `Exif\0\0`
//! prefix), which is what both `image` and `img-parts` exchange.

use super::backend::BackendError;
use super::params::CanonicalFormat;
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::{ImageEXIF, ImageICC};

const ORIENTATION_TAG: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;

/// Rewrite every orientation tag in the IFD chain to `1` (normal).
///
/// Returns `true` when at least one tag was rewritten. Malformed blocks are
/// left untouched.
pub fn reset_orientation(exif: &mut [u8]) -> bool {
    if exif.len() < 8 {
        return false;
    }

    let big_endian = match &exif[0..2] {
        b"MM" => true,
        b"II" => false,
        _ => return false,
    };

    let read_u16 = |data: &[u8], offset: usize| -> u16 {
        let bytes = [data[offset], data[offset + 1]];
        if big_endian {
            u16::from_be_bytes(bytes)
        } else {
            u16::from_le_bytes(bytes)
        }
    };

    let read_u32 = |data: &[u8], offset: usize| -> u32 {
        let bytes = [
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ];
        if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        }
    };

    if read_u16(exif, 2) != 42 {
        return false;
    }

    let normal = if big_endian {
        1u16.to_be_bytes()
    } else {
        1u16.to_le_bytes()
    };

    let mut rewritten = false;
    let mut ifd_offset = read_u32(exif, 4) as usize;
    // Guards against offset loops in hostile input
    let mut visited = 0;

    while ifd_offset >= 8 && ifd_offset + 2 <= exif.len() && visited < 8 {
        visited += 1;
        let entry_count = read_u16(exif, ifd_offset) as usize;
        let entries_start = ifd_offset + 2;

        for i in 0..entry_count {
            let entry = entries_start + i * 12;
            if entry + 12 > exif.len() {
                return rewritten;
            }
            let tag = read_u16(exif, entry);
            let typ = read_u16(exif, entry + 2);
            if tag == ORIENTATION_TAG && typ == TYPE_SHORT {
                // A single SHORT lives inline in the first two value bytes
                exif[entry + 8..entry + 10].copy_from_slice(&normal);
                rewritten = true;
            }
        }

        let next = entries_start + entry_count * 12;
        if next + 4 > exif.len() {
            break;
        }
        ifd_offset = read_u32(exif, next) as usize;
    }

    rewritten
}

/// Splice EXIF and ICC segments into an already-encoded image.
///
/// GIF output and calls with nothing to attach return `encoded` unchanged.
pub fn attach_metadata(
    encoded: Vec<u8>,
    format: CanonicalFormat,
    exif: Option<&[u8]>,
    icc_profile: Option<&[u8]>,
) -> Result<Vec<u8>, BackendError> {
    if exif.is_none() && icc_profile.is_none() {
        return Ok(encoded);
    }

    match format {
        CanonicalFormat::Jpeg => {
            let mut jpeg = Jpeg::from_bytes(encoded.into()).map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to re-read encoded JPEG: {e}"))
            })?;
            jpeg.set_exif(exif.map(|e| e.to_vec().into()));
            jpeg.set_icc_profile(icc_profile.map(|p| p.to_vec().into()));
            Ok(jpeg.encoder().bytes().to_vec())
        }
        CanonicalFormat::Png => {
            let mut png = Png::from_bytes(encoded.into()).map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to re-read encoded PNG: {e}"))
            })?;
            png.set_exif(exif.map(|e| e.to_vec().into()));
            png.set_icc_profile(icc_profile.map(|p| p.to_vec().into()));
            Ok(png.encoder().bytes().to_vec())
        }
        CanonicalFormat::Gif => Ok(encoded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{jpeg_bytes, orientation_exif, orientation_exif_be};
    use image::metadata::Orientation;

    #[test]
    fn resets_little_endian_orientation() {
        let mut exif = orientation_exif(6);
        assert_eq!(
            Orientation::from_exif_chunk(&exif),
            Some(Orientation::Rotate90)
        );

        assert!(reset_orientation(&mut exif));
        assert_eq!(
            Orientation::from_exif_chunk(&exif),
            Some(Orientation::NoTransforms)
        );
    }

    #[test]
    fn resets_big_endian_orientation() {
        let mut exif = orientation_exif_be(3);
        assert!(reset_orientation(&mut exif));
        assert_eq!(
            Orientation::from_exif_chunk(&exif),
            Some(Orientation::NoTransforms)
        );
    }

    #[test]
    fn malformed_block_is_untouched() {
        let mut garbage = b"not a tiff header at all".to_vec();
        let before = garbage.clone();
        assert!(!reset_orientation(&mut garbage));
        assert_eq!(garbage, before);

        let mut short = vec![b'I', b'I', 42];
        assert!(!reset_orientation(&mut short));
    }

    #[test]
    fn truncated_ifd_does_not_panic() {
        let mut exif = orientation_exif(8);
        exif.truncate(14);
        assert!(!reset_orientation(&mut exif));
    }

    #[test]
    fn attach_round_trips_exif_into_jpeg() {
        let exif = orientation_exif(1);
        let jpeg = jpeg_bytes(16, 8);

        let with_meta =
            attach_metadata(jpeg, CanonicalFormat::Jpeg, Some(&exif), None).unwrap();

        let parsed = Jpeg::from_bytes(with_meta.into()).unwrap();
        assert_eq!(parsed.exif().map(|b| b.to_vec()), Some(exif));
    }

    #[test]
    fn attach_is_noop_for_gif_and_empty_metadata() {
        let payload = b"GIF89a-payload".to_vec();
        let out = attach_metadata(
            payload.clone(),
            CanonicalFormat::Gif,
            Some(&orientation_exif(1)),
            None,
        )
        .unwrap();
        assert_eq!(out, payload);

        let jpeg = jpeg_bytes(4, 4);
        let out = attach_metadata(jpeg.clone(), CanonicalFormat::Jpeg, None, None).unwrap();
        assert_eq!(out, jpeg);
    }
}
