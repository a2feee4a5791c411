//! Wire encodings for binarized frames.

use serde::Deserialize;

use super::frame::MonoFrame;

const PACKET_START: u8 = 0x80;
const PACKET_END: u8 = 0x8F;
/// Write column data to one panel without refreshing it.
const CMD_WRITE_BUFFERED: u8 = 0x84;
/// Refresh every panel from its buffer.
const CMD_REFRESH_ALL: u8 = 0x82;

/// Physical panel arrangement of a flip-dot board.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PanelLayout {
    /// Panel bus addresses, one row of panels per entry, left to right.
    pub addresses: Vec<Vec<u8>>,
    pub panel_width: u32,
    pub panel_height: u32,
    /// Panels are mounted so their column order is reversed.
    pub mirrored: bool,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            addresses: vec![
                vec![3, 2, 1],
                vec![4, 5, 6],
                vec![9, 8, 7],
                vec![10, 11, 12],
            ],
            panel_width: 28,
            panel_height: 7,
            mirrored: true,
        }
    }
}

impl PanelLayout {
    /// Board size in dots.
    pub fn board_size(&self) -> (u32, u32) {
        let cols = self.addresses.iter().map(Vec::len).max().unwrap_or(0) as u32;
        let rows = self.addresses.len() as u32;
        (cols * self.panel_width, rows * self.panel_height)
    }

    /// One write packet per panel followed by a single refresh packet.
    pub fn encode(&self, frame: &MonoFrame) -> Vec<u8> {
        let panels: usize = self.addresses.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(panels * (self.panel_width as usize + 4) + 3);

        for (row, addresses) in self.addresses.iter().enumerate() {
            let y0 = row as u32 * self.panel_height;
            for (col, &address) in addresses.iter().enumerate() {
                let x0 = col as u32 * self.panel_width;
                out.extend_from_slice(&[PACKET_START, CMD_WRITE_BUFFERED, address]);
                for i in 0..self.panel_width {
                    let x = if self.mirrored {
                        x0 + self.panel_width - 1 - i
                    } else {
                        x0 + i
                    };
                    out.push(self.column_byte(frame, x, y0));
                }
                out.push(PACKET_END);
            }
        }

        out.extend_from_slice(&[PACKET_START, CMD_REFRESH_ALL, PACKET_END]);
        out
    }

    /// Bit k is row k of the panel; at most 7 rows fit below the framing bit.
    fn column_byte(&self, frame: &MonoFrame, x: u32, y0: u32) -> u8 {
        (0..self.panel_height.min(7)).fold(0u8, |byte, k| {
            if frame.get(x, y0 + k) {
                byte | (1 << k)
            } else {
                byte
            }
        })
    }
}

/// How a target serializes frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEncoding {
    /// Addressed panel packets for flip-dot controllers.
    Panel(PanelLayout),
    /// Row-major bitmap, 8 dots per byte, MSB first, 1 = dark (dot off).
    /// `invert` makes 1 mean a lit dot.
    Packed { invert: bool },
}

impl FrameEncoding {
    pub fn encode(&self, frame: &MonoFrame) -> Vec<u8> {
        match self {
            FrameEncoding::Panel(layout) => layout.encode(frame),
            FrameEncoding::Packed { invert } => pack_bits(frame, *invert),
        }
    }
}

/// Pack dots into bytes, most significant bit first.
///
/// A bit is set for every dark dot, or every lit dot when `invert` is true.
/// The final byte is zero-padded either way.
pub fn pack_bits(frame: &MonoFrame, invert: bool) -> Vec<u8> {
    let total = frame.width() as usize * frame.height() as usize;
    let mut out = vec![0u8; total.div_ceil(8)];

    let mut i = 0usize;
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            if frame.get(x, y) == invert {
                out[i / 8] |= 0x80 >> (i % 8);
            }
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_board_size() {
        assert_eq!(PanelLayout::default().board_size(), (84, 28));
    }

    #[test]
    fn test_pack_bits_msb_first() {
        let mut frame = MonoFrame::new(10, 1);
        frame.set(0, 0, true);
        frame.set(9, 0, true);
        assert_eq!(pack_bits(&frame, false), vec![0x7F, 0x80]);
        assert_eq!(pack_bits(&frame, true), vec![0x80, 0x40]);
    }

    #[test]
    fn test_pack_bits_dark_frame_sets_every_bit() {
        let frame = MonoFrame::new(8, 2);
        assert_eq!(pack_bits(&frame, false), vec![0xFF, 0xFF]);
        assert_eq!(pack_bits(&frame, true), vec![0x00, 0x00]);
    }

    #[test]
    fn test_panel_packets() {
        let layout = PanelLayout {
            addresses: vec![vec![7]],
            panel_width: 3,
            panel_height: 7,
            mirrored: false,
        };
        let mut frame = MonoFrame::new(3, 7);
        frame.set(0, 0, true);
        frame.set(2, 6, true);

        let bytes = layout.encode(&frame);
        assert_eq!(
            bytes,
            vec![0x80, 0x84, 7, 0x01, 0x00, 0x40, 0x8F, 0x80, 0x82, 0x8F]
        );
    }

    #[test]
    fn test_mirrored_reverses_columns() {
        let layout = PanelLayout {
            addresses: vec![vec![1, 2]],
            panel_width: 2,
            panel_height: 1,
            mirrored: true,
        };
        let mut frame = MonoFrame::new(4, 1);
        frame.set(0, 0, true);
        frame.set(3, 0, true);

        let bytes = layout.encode(&frame);
        // Panel 1 covers x 0..2 reversed: [x1, x0]; panel 2 x 2..4: [x3, x2]
        assert_eq!(
            bytes,
            vec![0x80, 0x84, 1, 0, 1, 0x8F, 0x80, 0x84, 2, 1, 0, 0x8F, 0x80, 0x82, 0x8F]
        );
    }

    #[test]
    fn test_default_layout_packet_length() {
        let frame = MonoFrame::new(84, 28);
        let bytes = FrameEncoding::Panel(PanelLayout::default()).encode(&frame);
        assert_eq!(bytes.len(), 12 * (28 + 4) + 3);
    }
}
