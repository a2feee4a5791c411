use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::warn;

use super::chunks::{write_chunk, SIGNATURE};
use super::PngError;
use crate::dither::luminance;
use crate::raster::PixelBuffer;

/// Output pixel layout. Alpha is always dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    /// One luminance byte per pixel (PNG color type 0).
    Grayscale,
    /// Three bytes per pixel (PNG color type 2).
    Rgb,
}

impl ColorType {
    fn code(self) -> u8 {
        match self {
            ColorType::Grayscale => 0,
            ColorType::Rgb => 2,
        }
    }

    fn channels(self) -> usize {
        match self {
            ColorType::Grayscale => 1,
            ColorType::Rgb => 3,
        }
    }
}

/// 1x1 black truecolor PNG returned whenever encoding fails.
const PLACEHOLDER_PNG: [u8; 69] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x90,
    0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x60,
    0x60, 0x60, 0x00, 0x00, 0x00, 0x04, 0x00, 0x01, 0xF6, 0x17, 0x38, 0x55, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub fn placeholder_png() -> &'static [u8] {
    &PLACEHOLDER_PNG
}

/// Encode an RGBA buffer as a non-interlaced 8-bit PNG.
pub fn encode_png(image: &PixelBuffer, color: ColorType) -> Result<Vec<u8>, PngError> {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 || width > i32::MAX as u32 || height > i32::MAX as u32 {
        return Err(PngError::InvalidDimensions { width, height });
    }

    let channels = color.channels();
    let stride = width as usize * channels;
    let mut raw = Vec::with_capacity((stride + 1) * height as usize);
    for row in image.data().chunks_exact(width as usize * 4) {
        // Filter type 0 (None) for every scanline
        raw.push(0);
        for px in row.chunks_exact(4) {
            match color {
                ColorType::Grayscale => raw.push(luminance(px[0], px[1], px[2])),
                ColorType::Rgb => raw.extend_from_slice(&px[..3]),
            }
        }
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    let idat = encoder.finish()?;

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    // bit depth, color type, compression, filter, interlace
    ihdr.extend_from_slice(&[8, color.code(), 0, 0, 0]);

    let mut out = Vec::with_capacity(SIGNATURE.len() + idat.len() + 64);
    out.extend_from_slice(&SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

/// Encode, falling back to the black placeholder on any failure.
///
/// The error that forced the fallback is handed back so the caller can count
/// it.
pub fn encode_or_placeholder(image: &PixelBuffer, color: ColorType) -> (Vec<u8>, Option<PngError>) {
    match encode_png(image, color) {
        Ok(bytes) => (bytes, None),
        Err(e) => {
            warn!("PNG encoding failed, using placeholder: {}", e);
            (PLACEHOLDER_PNG.to_vec(), Some(e))
        }
    }
}
