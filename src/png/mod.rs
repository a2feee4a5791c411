//! Minimal PNG encoder plus screenshot decoding.
//!
//! The encoder writes 8-bit greyscale or truecolor images with a single IDAT
//! chunk and no filtering. Decoding verifies chunk CRCs itself and hands the
//! pixel data to the `image` crate.

mod chunks;
mod decode;
mod encode;

use thiserror::Error;

pub use chunks::{Chunk, ChunkReader, SIGNATURE};
pub use decode::decode_png;
pub use encode::{encode_or_placeholder, encode_png, placeholder_png, ColorType};

#[derive(Debug, Error)]
pub enum PngError {
    #[error("not a PNG file")]
    BadSignature,

    #[error("unexpected end of PNG data")]
    Truncated,

    #[error("CRC mismatch in {chunk} chunk")]
    CrcMismatch { chunk: String },

    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("zlib stream error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
}
