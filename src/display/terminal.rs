//! Braille rendering of frames for the stdout target.
//!
//! Each braille character represents a 2x4 dot matrix, so an 84x28 board
//! fits in 42x7 terminal cells.

use std::io::Write;

use super::frame::MonoFrame;

/// Braille base character (U+2800, empty braille pattern).
pub const BRAILLE_BASE: char = '\u{2800}';

/// Dot bit for position (x, y) within a 2x4 braille cell.
///
/// ```text
/// [0,0]=1   [1,0]=8
/// [0,1]=2   [1,1]=16
/// [0,2]=4   [1,2]=32
/// [0,3]=64  [1,3]=128
/// ```
const DOT_BITS: [[u8; 4]; 2] = [[0x01, 0x02, 0x04, 0x40], [0x08, 0x10, 0x20, 0x80]];

/// Convert a 2x4 boolean grid (`grid[x][y]`) to a braille character.
pub fn grid_to_braille(grid: [[bool; 4]; 2]) -> char {
    let mut code = 0u32;
    for (x, column) in grid.iter().enumerate() {
        for (y, &on) in column.iter().enumerate() {
            if on {
                code |= DOT_BITS[x][y] as u32;
            }
        }
    }
    char::from_u32(BRAILLE_BASE as u32 + code).unwrap_or(BRAILLE_BASE)
}

/// Render a frame as lines of braille characters, one dot per pixel.
pub fn render_lines(frame: &MonoFrame) -> Vec<String> {
    let cols = frame.width().div_ceil(2);
    let rows = frame.height().div_ceil(4);

    (0..rows)
        .map(|cy| {
            (0..cols)
                .map(|cx| {
                    let mut grid = [[false; 4]; 2];
                    for (dx, column) in grid.iter_mut().enumerate() {
                        for (dy, dot) in column.iter_mut().enumerate() {
                            *dot = frame.get(cx * 2 + dx as u32, cy * 4 + dy as u32);
                        }
                    }
                    grid_to_braille(grid)
                })
                .collect()
        })
        .collect()
}

/// Write a frame to `out`, moving the cursor home first so successive frames
/// overwrite each other.
pub fn write_frame<W: Write>(out: &mut W, frame: &MonoFrame, label: &str) -> std::io::Result<()> {
    write!(out, "\x1b[H")?;
    writeln!(out, "[{}] {}x{}", label, frame.width(), frame.height())?;
    for line in render_lines(frame) {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}
