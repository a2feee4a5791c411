//! PNG chunk framing: length, type, data, CRC-32 over type + data.

use flate2::Crc;

use super::PngError;

pub const SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Append one chunk to `out`.
pub fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    out.extend_from_slice(&chunk_crc(kind, data).to_be_bytes());
}

fn chunk_crc(kind: &[u8; 4], data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(kind);
    crc.update(data);
    crc.sum()
}

/// A borrowed view of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: [u8; 4],
    pub data: &'a [u8],
}

impl Chunk<'_> {
    pub fn kind_str(&self) -> &str {
        std::str::from_utf8(&self.kind).unwrap_or("????")
    }
}

/// Walks the chunks of a PNG byte stream, verifying each CRC.
pub struct ChunkReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> ChunkReader<'a> {
    /// Check the signature and position the reader at the first chunk.
    pub fn new(bytes: &'a [u8]) -> Result<Self, PngError> {
        if bytes.len() < SIGNATURE.len() || bytes[..8] != SIGNATURE {
            return Err(PngError::BadSignature);
        }
        Ok(Self {
            bytes,
            pos: SIGNATURE.len(),
            done: false,
        })
    }

    fn read_u32(&self, at: usize) -> Result<u32, PngError> {
        let slice = self.bytes.get(at..at + 4).ok_or(PngError::Truncated)?;
        Ok(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    fn next_chunk(&mut self) -> Result<Chunk<'a>, PngError> {
        let len = self.read_u32(self.pos)? as usize;
        let kind_at = self.pos + 4;
        let data_at = kind_at + 4;
        let crc_at = data_at.checked_add(len).ok_or(PngError::Truncated)?;

        let kind_bytes = self
            .bytes
            .get(kind_at..data_at)
            .ok_or(PngError::Truncated)?;
        let kind = [kind_bytes[0], kind_bytes[1], kind_bytes[2], kind_bytes[3]];
        let data = self.bytes.get(data_at..crc_at).ok_or(PngError::Truncated)?;
        let stored = self.read_u32(crc_at)?;

        let chunk = Chunk { kind, data };
        if stored != chunk_crc(&kind, data) {
            return Err(PngError::CrcMismatch {
                chunk: chunk.kind_str().to_string(),
            });
        }

        self.pos = crc_at + 4;
        Ok(chunk)
    }
}

impl<'a> Iterator for ChunkReader<'a> {
    type Item = Result<Chunk<'a>, PngError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.bytes.len() {
            return None;
        }
        let result = self.next_chunk();
        match &result {
            Ok(chunk) if &chunk.kind == b"IEND" => self.done = true,
            Err(_) => self.done = true,
            Ok(_) => {}
        }
        Some(result)
    }
}
