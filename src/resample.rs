//! Resizing captured frames to the board resolution.

use crate::raster::PixelBuffer;

/// Resize with "cover" semantics: scale uniformly until the target is
/// completely filled, center, and crop whatever overflows.
///
/// Downscaling averages every source pixel that falls into a target cell;
/// upscaling picks the nearest source pixel. An empty source or target yields
/// an opaque black buffer of the target size.
pub fn resize_cover(src: &PixelBuffer, width: u32, height: u32) -> PixelBuffer {
    let mut out = PixelBuffer::filled(width, height, [0, 0, 0, 255]);
    let (sw, sh) = (src.width(), src.height());
    if width == 0 || height == 0 || sw == 0 || sh == 0 {
        return out;
    }

    // Source window covered by the target after uniform scaling
    let scale = (width as f32 / sw as f32).max(height as f32 / sh as f32);
    let win_w = width as f32 / scale;
    let win_h = height as f32 / scale;
    let off_x = (sw as f32 - win_w) / 2.0;
    let off_y = (sh as f32 - win_h) / 2.0;
    let cell_w = win_w / width as f32;
    let cell_h = win_h / height as f32;

    for ty in 0..height {
        let y0 = off_y + ty as f32 * cell_h;
        let (start_y, end_y) = span(y0, cell_h, sh);

        for tx in 0..width {
            let x0 = off_x + tx as f32 * cell_w;
            let (start_x, end_x) = span(x0, cell_w, sw);

            let mut sum = [0u32; 4];
            let mut count = 0u32;
            for py in start_y..end_y {
                for px in start_x..end_x {
                    if let Some(rgba) = src.get(px as i64, py as i64) {
                        for (acc, c) in sum.iter_mut().zip(rgba) {
                            *acc += c as u32;
                        }
                        count += 1;
                    }
                }
            }

            if count > 0 {
                let avg = sum.map(|s| (s / count) as u8);
                out.set(tx as i64, ty as i64, avg);
            }
        }
    }

    out
}

/// Pixel range `[start, end)` covered by a cell, always at least one pixel.
fn span(start: f32, size: f32, limit: u32) -> (u32, u32) {
    let first = (start.max(0.0) as u32).min(limit - 1);
    let last = ((start + size).ceil().max(0.0) as u32).min(limit);
    (first, last.max(first + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_size_is_identity() {
        let mut src = PixelBuffer::filled(4, 2, [0, 0, 0, 255]);
        src.set(3, 1, [200, 100, 50, 255]);
        let out = resize_cover(&src, 4, 2);
        assert_eq!(out, src);
    }

    #[test]
    fn test_downscale_averages() {
        let mut src = PixelBuffer::filled(2, 2, [0, 0, 0, 255]);
        src.set(0, 0, [255, 255, 255, 255]);
        src.set(1, 1, [255, 255, 255, 255]);
        let out = resize_cover(&src, 1, 1);
        assert_eq!(out.get(0, 0), Some([127, 127, 127, 255]));
    }

    #[test]
    fn test_cover_crops_wider_source() {
        // 6x2 source with white on the outer columns only; a 2x2 cover fit
        // keeps the central 2x2 window.
        let mut src = PixelBuffer::filled(6, 2, [0, 0, 0, 255]);
        for y in 0..2 {
            src.set(0, y, [255, 255, 255, 255]);
            src.set(5, y, [255, 255, 255, 255]);
        }
        let out = resize_cover(&src, 2, 2);
        assert!(out.data().chunks_exact(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn test_upscale_uses_nearest() {
        let src = PixelBuffer::filled(1, 1, [9, 9, 9, 255]);
        let out = resize_cover(&src, 3, 2);
        assert!(out.data().chunks_exact(4).all(|p| p == [9, 9, 9, 255]));
    }

    #[test]
    fn test_empty_target() {
        let src = PixelBuffer::filled(2, 2, [1, 1, 1, 255]);
        assert_eq!(resize_cover(&src, 0, 5).pixel_count(), 0);
    }
}
