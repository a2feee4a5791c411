//! Binarization of RGBA frames for two-state displays.
//!
//! Both policies share one luminance formula (ITU-R BT.601) and one threshold
//! rule: a pixel is white when its luminance is `>= threshold`.

use serde::Deserialize;

use crate::display::MonoFrame;
use crate::raster::PixelBuffer;

/// Default cut-off between black and white dots.
pub const DEFAULT_THRESHOLD: u8 = 128;

const BLACK: [u8; 4] = [0, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];

/// How grey levels are reduced to on/off dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DitherMode {
    /// Hard threshold per pixel.
    Threshold,
    /// Floyd-Steinberg error diffusion.
    #[default]
    FloydSteinberg,
}

impl std::str::FromStr for DitherMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threshold" => Ok(DitherMode::Threshold),
            "floyd-steinberg" | "floyd" | "fs" => Ok(DitherMode::FloydSteinberg),
            other => Err(format!("unknown dither mode: {}", other)),
        }
    }
}

/// ITU-R BT.601 luminance with integer math.
///
/// Coefficients are scaled by 1000: 299 + 587 + 114 = 1000.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Luminance plane of an RGBA buffer, one byte per pixel. Alpha is ignored.
pub fn to_luminance(image: &PixelBuffer) -> Vec<u8> {
    image
        .data()
        .chunks_exact(4)
        .map(|px| luminance(px[0], px[1], px[2]))
        .collect()
}

/// Hard-threshold binarization.
pub fn threshold(image: &PixelBuffer, cutoff: u8) -> PixelBuffer {
    let mut out = image.clone();
    for px in out.data_mut().chunks_exact_mut(4) {
        let on = luminance(px[0], px[1], px[2]) >= cutoff;
        px.copy_from_slice(if on { &WHITE } else { &BLACK });
    }
    out
}

/// Floyd-Steinberg error diffusion.
///
/// Pixels are visited in raster order; each quantization error is pushed
/// 7/16 right, 3/16 down-left, 5/16 down and 1/16 down-right. Targets that
/// fall outside the image are skipped, so the error is dropped there.
pub fn floyd_steinberg(image: &PixelBuffer, cutoff: u8) -> PixelBuffer {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let mut plane: Vec<f32> = to_luminance(image).into_iter().map(f32::from).collect();
    let cutoff = cutoff as f32;

    let mut out = image.clone();
    let data = out.data_mut();

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let old = plane[i];
            let new = if old >= cutoff { 255.0 } else { 0.0 };
            let err = old - new;

            let px = &mut data[i * 4..i * 4 + 4];
            px.copy_from_slice(if new > 0.0 { &WHITE } else { &BLACK });

            if x + 1 < width {
                plane[i + 1] += err * 7.0 / 16.0;
            }
            if y + 1 < height {
                let below = i + width;
                if x > 0 {
                    plane[below - 1] += err * 3.0 / 16.0;
                }
                plane[below] += err * 5.0 / 16.0;
                if x + 1 < width {
                    plane[below + 1] += err * 1.0 / 16.0;
                }
            }
        }
    }

    out
}

/// A configured binarization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binarizer {
    pub mode: DitherMode,
    pub threshold: u8,
}

impl Default for Binarizer {
    fn default() -> Self {
        Self {
            mode: DitherMode::default(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl Binarizer {
    pub fn new(mode: DitherMode, threshold: u8) -> Self {
        Self { mode, threshold }
    }

    /// Reduce to pure black/white RGBA. Output dimensions match the input.
    pub fn apply(&self, image: &PixelBuffer) -> PixelBuffer {
        match self.mode {
            DitherMode::Threshold => threshold(image, self.threshold),
            DitherMode::FloydSteinberg => floyd_steinberg(image, self.threshold),
        }
    }

    /// Binarize straight into a display frame.
    pub fn to_mono(&self, image: &PixelBuffer) -> MonoFrame {
        MonoFrame::from_binary_rgba(&self.apply(image))
    }
}
