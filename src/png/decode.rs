use image::ImageFormat;

use super::chunks::ChunkReader;
use super::PngError;
use crate::raster::PixelBuffer;

/// Decode a PNG into an RGBA buffer.
///
/// Chunk CRCs are checked with [`ChunkReader`] first, so corruption reports
/// the offending chunk. Pixel decoding is left to the `image` crate.
pub fn decode_png(bytes: &[u8]) -> Result<PixelBuffer, PngError> {
    for chunk in ChunkReader::new(bytes)? {
        chunk?;
    }

    let rgba = image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    PixelBuffer::from_raw(width, height, rgba.into_raw())
        .ok_or(PngError::InvalidDimensions { width, height })
}
