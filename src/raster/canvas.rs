//! Drawing surfaces: the software rasterizer and the placeholder surface.

use super::buffer::PixelBuffer;
use super::color::{parse_color, Rgba};
use crate::png;

/// The minimal 2D drawing API the renderer needs.
///
/// Coordinates are in pixels; rectangles extending past the surface are
/// clipped, never rejected.
pub trait Surface: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Fill a rectangle with a color (source-over blending for alpha < 255).
    fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgba);

    /// Draw a one-pixel rectangle outline.
    fn stroke_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgba);

    /// Copy a region out of the surface. Pixels outside the surface read as
    /// opaque black.
    fn get_image_data(&self, x: i64, y: i64, w: u32, h: u32) -> PixelBuffer;

    /// Write a buffer into the surface at (x, y), replacing pixels.
    fn put_image_data(&mut self, image: &PixelBuffer, x: i64, y: i64);

    /// Encode the current contents as PNG.
    fn to_png(&self) -> Vec<u8>;

    /// Fill the whole surface.
    fn clear(&mut self, color: Rgba) {
        let (w, h) = (self.width() as i64, self.height() as i64);
        self.fill_rect(0, 0, w, h, color);
    }

    /// Set the current fill color from a CSS-like string.
    fn set_fill_style(&mut self, style: &str);

    /// Set the current stroke color from a CSS-like string.
    fn set_stroke_style(&mut self, style: &str);

    fn fill_style(&self) -> Rgba;
    fn stroke_style(&self) -> Rgba;

    /// Fill a rectangle with the current fill style.
    fn fill_styled_rect(&mut self, x: i64, y: i64, w: i64, h: i64) {
        let color = self.fill_style();
        self.fill_rect(x, y, w, h, color);
    }

    /// Outline a rectangle with the current stroke style.
    fn stroke_styled_rect(&mut self, x: i64, y: i64, w: i64, h: i64) {
        let color = self.stroke_style();
        self.stroke_rect(x, y, w, h, color);
    }
}

/// Software rasterizer writing straight into an RGBA byte array.
#[derive(Debug, Clone)]
pub struct SoftwareCanvas {
    buffer: PixelBuffer,
    fill: Rgba,
    stroke: Rgba,
}

impl SoftwareCanvas {
    /// Create a canvas initialized to opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: PixelBuffer::filled(width, height, Rgba::BLACK.to_array()),
            fill: Rgba::BLACK,
            stroke: Rgba::BLACK,
        }
    }

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    #[inline]
    fn blend_pixel(&mut self, x: i64, y: i64, color: Rgba) {
        let Some(i) = self.buffer.offset(x, y) else {
            return;
        };
        let data = self.buffer.data_mut();
        if color.a == 255 {
            data[i..i + 4].copy_from_slice(&color.to_array());
            return;
        }
        if color.a == 0 {
            return;
        }

        let a = color.a as u32;
        let inv = 255 - a;
        let mix = |src: u8, dst: u8| ((src as u32 * a + dst as u32 * inv + 127) / 255) as u8;
        data[i] = mix(color.r, data[i]);
        data[i + 1] = mix(color.g, data[i + 1]);
        data[i + 2] = mix(color.b, data[i + 2]);
        data[i + 3] = (a + (data[i + 3] as u32 * inv + 127) / 255).min(255) as u8;
    }

    /// Clip a rectangle to the canvas, returning half-open pixel ranges.
    fn clip(&self, x: i64, y: i64, w: i64, h: i64) -> Option<(i64, i64, i64, i64)> {
        if w <= 0 || h <= 0 {
            return None;
        }
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(self.buffer.width() as i64);
        let y1 = (y + h).min(self.buffer.height() as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0, y0, x1, y1))
    }
}

impl Surface for SoftwareCanvas {
    fn width(&self) -> u32 {
        self.buffer.width()
    }

    fn height(&self) -> u32 {
        self.buffer.height()
    }

    fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgba) {
        let Some((x0, y0, x1, y1)) = self.clip(x, y, w, h) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px, py, color);
            }
        }
    }

    fn stroke_rect(&mut self, x: i64, y: i64, w: i64, h: i64, color: Rgba) {
        if w <= 0 || h <= 0 {
            return;
        }
        // Top and bottom rows
        self.fill_rect(x, y, w, 1, color);
        if h > 1 {
            self.fill_rect(x, y + h - 1, w, 1, color);
        }
        // Left and right columns, excluding corners already drawn
        if h > 2 {
            self.fill_rect(x, y + 1, 1, h - 2, color);
            if w > 1 {
                self.fill_rect(x + w - 1, y + 1, 1, h - 2, color);
            }
        }
    }

    fn get_image_data(&self, x: i64, y: i64, w: u32, h: u32) -> PixelBuffer {
        let mut out = PixelBuffer::filled(w, h, Rgba::BLACK.to_array());
        for py in 0..h as i64 {
            for px in 0..w as i64 {
                if let Some(rgba) = self.buffer.get(x + px, y + py) {
                    out.set(px, py, rgba);
                }
            }
        }
        out
    }

    fn put_image_data(&mut self, image: &PixelBuffer, x: i64, y: i64) {
        for py in 0..image.height() as i64 {
            for px in 0..image.width() as i64 {
                if let Some(rgba) = image.get(px, py) {
                    self.buffer.set(x + px, y + py, rgba);
                }
            }
        }
    }

    fn to_png(&self) -> Vec<u8> {
        png::encode_or_placeholder(&self.buffer, png::ColorType::Rgb).0
    }

    fn set_fill_style(&mut self, style: &str) {
        self.fill = parse_color(style);
    }

    fn set_stroke_style(&mut self, style: &str) {
        self.stroke = parse_color(style);
    }

    fn fill_style(&self) -> Rgba {
        self.fill
    }

    fn stroke_style(&self) -> Rgba {
        self.stroke
    }
}

/// Last-resort surface: accepts every draw call, renders nothing.
#[derive(Debug, Clone)]
pub struct PlaceholderCanvas {
    width: u32,
    height: u32,
}

impl PlaceholderCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Surface for PlaceholderCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn fill_rect(&mut self, _x: i64, _y: i64, _w: i64, _h: i64, _color: Rgba) {}

    fn stroke_rect(&mut self, _x: i64, _y: i64, _w: i64, _h: i64, _color: Rgba) {}

    fn get_image_data(&self, _x: i64, _y: i64, w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::filled(w, h, Rgba::BLACK.to_array())
    }

    fn put_image_data(&mut self, _image: &PixelBuffer, _x: i64, _y: i64) {}

    fn to_png(&self) -> Vec<u8> {
        png::placeholder_png().to_vec()
    }

    fn set_fill_style(&mut self, _style: &str) {}

    fn set_stroke_style(&mut self, _style: &str) {}

    fn fill_style(&self) -> Rgba {
        Rgba::BLACK
    }

    fn stroke_style(&self) -> Rgba {
        Rgba::BLACK
    }
}
