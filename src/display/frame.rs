use crate::dither::luminance;
use crate::raster::PixelBuffer;

/// A binarized frame: one on/off dot per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoFrame {
    width: u32,
    height: u32,
    dots: Vec<bool>,
}

impl MonoFrame {
    /// All dots off.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            dots: vec![false; width as usize * height as usize],
        }
    }

    /// Read a black/white RGBA buffer. A pixel counts as on when it is
    /// bright (luminance >= 128).
    pub fn from_binary_rgba(image: &PixelBuffer) -> Self {
        let dots = image
            .data()
            .chunks_exact(4)
            .map(|px| luminance(px[0], px[1], px[2]) >= 128)
            .collect();
        Self {
            width: image.width(),
            height: image.height(),
            dots,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Dot state at (x, y); anything outside the frame is off.
    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.dots[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, on: bool) {
        if x < self.width && y < self.height {
            self.dots[(y * self.width + x) as usize] = on;
        }
    }

    pub fn count_on(&self) -> usize {
        self.dots.iter().filter(|&&d| d).count()
    }

    /// Crop or pad (with off dots) to the given size, anchored top-left.
    pub fn fitted(&self, width: u32, height: u32) -> MonoFrame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let mut out = MonoFrame::new(width, height);
        for y in 0..height.min(self.height) {
            for x in 0..width.min(self.width) {
                out.set(x, y, self.get(x, y));
            }
        }
        out
    }

    /// Expand back to black/white RGBA.
    pub fn to_rgba(&self) -> PixelBuffer {
        let mut image = PixelBuffer::filled(self.width, self.height, [0, 0, 0, 255]);
        for y in 0..self.height {
            for x in 0..self.width {
                if self.get(x, y) {
                    image.set(x as i64, y as i64, [255, 255, 255, 255]);
                }
            }
        }
        image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_binary_rgba() {
        let mut image = PixelBuffer::filled(2, 2, [0, 0, 0, 255]);
        image.set(1, 0, [255, 255, 255, 255]);
        let frame = MonoFrame::from_binary_rgba(&image);
        assert!(frame.get(1, 0));
        assert!(!frame.get(0, 0));
        assert_eq!(frame.count_on(), 1);
        assert_eq!(frame.to_rgba(), image);
    }

    #[test]
    fn test_out_of_bounds_is_off() {
        let mut frame = MonoFrame::new(2, 2);
        frame.set(5, 5, true);
        assert!(!frame.get(5, 5));
        assert_eq!(frame.count_on(), 0);
    }

    #[test]
    fn test_fitted_crops_and_pads() {
        let mut frame = MonoFrame::new(3, 1);
        frame.set(0, 0, true);
        frame.set(2, 0, true);

        let cropped = frame.fitted(2, 2);
        assert!(cropped.get(0, 0));
        assert!(!cropped.get(1, 0));
        assert!(!cropped.get(0, 1));
        assert_eq!(cropped.count_on(), 1);
    }
}
