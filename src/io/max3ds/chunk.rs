//! Tag-length-value chunk framing
//!
//! A chunk is a 2-byte id and a 4-byte total length (header included),
//! both little-endian, followed by data and/or nested chunks. The
//! [`ChunkReader`] keeps a stack of open chunks and charges every read to
//! the innermost one, so a chunk can always be left at exactly
//! `start + len` whatever its handler consumed.

use crate::error::{ImportError, Location, Result};
use crate::io::source::ByteSource;
use byteorder::{ByteOrder, LittleEndian};

pub const MAIN3DS: u16 = 0x4D4D;
pub const M3D_VERSION: u16 = 0x0002;
pub const MASTER_SCALE: u16 = 0x0100;

pub const COLOR_F: u16 = 0x0010;
pub const COLOR_24: u16 = 0x0011;
pub const LIN_COLOR_24: u16 = 0x0012;
pub const LIN_COLOR_F: u16 = 0x0013;
pub const INT_PERCENTAGE: u16 = 0x0030;
pub const FLOAT_PERCENTAGE: u16 = 0x0031;

pub const EDIT3DS: u16 = 0x3D3D;
pub const MESH_VERSION: u16 = 0x3D3E;

pub const EDIT_MATERIAL: u16 = 0xAFFF;
pub const MAT_NAME: u16 = 0xA000;
pub const MAT_AMBIENT: u16 = 0xA010;
pub const MAT_DIFFUSE: u16 = 0xA020;
pub const MAT_SPECULAR: u16 = 0xA030;
pub const MAT_SHININESS: u16 = 0xA040;
pub const MAT_SHIN2PCT: u16 = 0xA041;
pub const MAT_TRANSPARENCY: u16 = 0xA050;
pub const MAT_TWO_SIDE: u16 = 0xA081;
pub const MAT_SELF_ILPCT: u16 = 0xA084;
pub const MAT_TEXMAP: u16 = 0xA200;
pub const MAT_REFLMAP: u16 = 0xA220;
pub const MAT_MAPNAME: u16 = 0xA300;
pub const MAT_MAP_TILING: u16 = 0xA351;

pub const EDIT_OBJECT: u16 = 0x4000;
pub const OBJ_TRIMESH: u16 = 0x4100;
pub const TRI_VERTEXL: u16 = 0x4110;
pub const TRI_FACEL1: u16 = 0x4120;
pub const TRI_MATERIAL: u16 = 0x4130;
pub const TRI_MAPPINGCOORS: u16 = 0x4140;
pub const TRI_SMOOTH: u16 = 0x4150;
pub const TRI_LOCAL: u16 = 0x4160;

pub const KEYF3DS: u16 = 0xB000;
pub const KF_OBJECT_NODE: u16 = 0xB002;
pub const KF_SEG: u16 = 0xB008;
pub const KF_HDR: u16 = 0xB00A;
pub const KF_NODE_HDR: u16 = 0xB010;
pub const KF_NODE_ID: u16 = 0xB030;

/// Header of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: u16,
    /// Total length including the 6-byte header
    pub len: u32,
    /// Absolute offset of the header
    pub start: u64,
}

impl ChunkHeader {
    pub const SIZE: u64 = 6;

    /// Offset just past the chunk
    pub fn end(&self) -> u64 {
        self.start + self.len as u64
    }
}

#[derive(Debug)]
struct Frame {
    header: ChunkHeader,
    left: u64,
}

/// Stack-based chunk walker over a [`ByteSource`]
pub struct ChunkReader<'s> {
    source: &'s mut dyn ByteSource,
    stack: Vec<Frame>,
    stream_len: u64,
}

impl<'s> ChunkReader<'s> {
    pub fn new(source: &'s mut dyn ByteSource) -> Result<Self> {
        let stream_len = source.stream_len()?;
        Ok(Self {
            source,
            stack: Vec::new(),
            stream_len,
        })
    }

    /// Number of open chunks
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Bytes not yet consumed in the innermost open chunk
    pub fn remaining(&self) -> u64 {
        self.stack.last().map(|f| f.left).unwrap_or(0)
    }

    /// Whether another child header fits in the innermost chunk
    pub fn has_child(&self) -> bool {
        self.remaining() >= ChunkHeader::SIZE
    }

    /// Current absolute offset
    pub fn position(&mut self) -> Result<u64> {
        self.source.tell()
    }

    /// Read the next header and open it as the innermost chunk.
    ///
    /// The full declared length is charged to the parent at once.
    pub fn open(&mut self) -> Result<ChunkHeader> {
        let start = self.source.tell()?;
        if let Some(parent) = self.stack.last() {
            if parent.left < ChunkHeader::SIZE {
                return Err(ImportError::malformed(
                    Location::Offset(start),
                    format!("no room for a child header in chunk {:#06X}", parent.header.id),
                ));
            }
        }
        if start + ChunkHeader::SIZE > self.stream_len {
            return Err(ImportError::truncated(
                Location::Offset(start),
                "chunk header past end of file",
            ));
        }

        let mut raw = [0u8; 6];
        self.source.read_exact(&mut raw)?;
        let header = ChunkHeader {
            id: LittleEndian::read_u16(&raw[0..2]),
            len: LittleEndian::read_u32(&raw[2..6]),
            start,
        };

        if (header.len as u64) < ChunkHeader::SIZE {
            return Err(ImportError::malformed(
                Location::Offset(start),
                format!("chunk {:#06X} declares length {}", header.id, header.len),
            ));
        }
        if header.end() > self.stream_len {
            return Err(ImportError::truncated(
                Location::Offset(start),
                format!(
                    "chunk {:#06X} declares {} bytes, {} available",
                    header.id,
                    header.len,
                    self.stream_len - start
                ),
            ));
        }
        if let Some(parent) = self.stack.last_mut() {
            if header.len as u64 > parent.left {
                return Err(ImportError::malformed(
                    Location::Offset(start),
                    format!(
                        "chunk {:#06X} ({} bytes) overruns parent {:#06X} ({} bytes left)",
                        header.id, header.len, parent.header.id, parent.left
                    ),
                ));
            }
            parent.left -= header.len as u64;
        }

        self.stack.push(Frame {
            header,
            left: header.len as u64 - ChunkHeader::SIZE,
        });
        Ok(header)
    }

    /// Leave the innermost chunk, positioning the source at its end
    pub fn close(&mut self) -> Result<ChunkHeader> {
        let frame = self.stack.pop().ok_or_else(|| {
            ImportError::malformed(Location::Unknown, "close without an open chunk")
        })?;
        self.source.seek(frame.header.end())?;
        Ok(frame.header)
    }

    /// Charge `n` bytes to the innermost chunk before reading them
    fn take(&mut self, n: u64) -> Result<()> {
        let at = self.source.tell()?;
        let frame = self
            .stack
            .last_mut()
            .ok_or_else(|| ImportError::malformed(Location::Offset(at), "read outside a chunk"))?;
        if frame.left < n {
            return Err(ImportError::malformed(
                Location::Offset(at),
                format!(
                    "read of {n} bytes past end of chunk {:#06X} ({} left)",
                    frame.header.id, frame.left
                ),
            ));
        }
        frame.left -= n;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.take(1)?;
        self.source.read_u8()
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.take(2)?;
        self.source.read_u16_le()
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.take(4)?;
        self.source.read_u32_le()
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.take(4)?;
        self.source.read_f32_le()
    }

    /// Read `n` raw bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        self.take(n as u64)?;
        let mut buf = vec![0u8; n];
        self.source.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a NUL-terminated string bounded by the innermost chunk
    pub fn read_cstring(&mut self) -> Result<String> {
        let limit = self.remaining() as usize;
        let start = self.source.tell()?;
        let value = self.source.read_cstring(limit)?;
        let consumed = self.source.tell()? - start;
        if let Some(frame) = self.stack.last_mut() {
            frame.left -= consumed;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::source::StreamSource;

    fn chunk(id: u16, body: &[u8]) -> Vec<u8> {
        let mut out = id.to_le_bytes().to_vec();
        out.extend_from_slice(&((body.len() + 6) as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_nested_accounting() {
        let inner = chunk(0x0010, &[0u8; 12]);
        let data = chunk(0xA010, &inner);
        let mut src = StreamSource::from_bytes(data);
        let mut reader = ChunkReader::new(&mut src).unwrap();

        let outer = reader.open().unwrap();
        assert_eq!(outer.len, 24);
        assert_eq!(reader.remaining(), 18);

        let child = reader.open().unwrap();
        assert_eq!(child.id, 0x0010);
        reader.read_f32().unwrap();
        assert_eq!(reader.remaining(), 8);
        reader.close().unwrap();

        assert_eq!(reader.remaining(), 0);
        assert!(!reader.has_child());
        reader.close().unwrap();
        assert_eq!(reader.position().unwrap(), 24);
    }

    #[test]
    fn test_close_skips_exactly() {
        let mut data = chunk(0x1234, &[9u8; 10]);
        data.extend(chunk(0x0002, &3u32.to_le_bytes()));
        let mut src = StreamSource::from_bytes(data);
        let mut reader = ChunkReader::new(&mut src).unwrap();

        let unknown = reader.open().unwrap();
        reader.close().unwrap();
        assert_eq!(reader.position().unwrap(), unknown.end());

        let version = reader.open().unwrap();
        assert_eq!(version.id, M3D_VERSION);
        assert_eq!(reader.read_u32().unwrap(), 3);
    }

    #[test]
    fn test_zero_length_is_malformed() {
        let mut data = 0x4D4Du16.to_le_bytes().to_vec();
        data.extend_from_slice(&0u32.to_le_bytes());
        let mut src = StreamSource::from_bytes(data);
        let mut reader = ChunkReader::new(&mut src).unwrap();
        assert!(matches!(reader.open(), Err(ImportError::Malformed { .. })));
    }

    #[test]
    fn test_declared_length_past_eof_is_truncation() {
        let mut data = 0x4D4Du16.to_le_bytes().to_vec();
        data.extend_from_slice(&100u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 10]);
        let mut src = StreamSource::from_bytes(data);
        let mut reader = ChunkReader::new(&mut src).unwrap();
        assert!(matches!(
            reader.open(),
            Err(ImportError::TruncatedInput { location: Location::Offset(0), .. })
        ));
    }

    #[test]
    fn test_child_overrunning_parent() {
        // parent claims 12 bytes but its child claims 20
        let mut data = 0x3D3Du16.to_le_bytes().to_vec();
        data.extend_from_slice(&12u32.to_le_bytes());
        data.extend_from_slice(&0x4000u16.to_le_bytes());
        data.extend_from_slice(&20u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 20]);
        let mut src = StreamSource::from_bytes(data);
        let mut reader = ChunkReader::new(&mut src).unwrap();
        reader.open().unwrap();
        assert!(matches!(reader.open(), Err(ImportError::Malformed { .. })));
    }

    #[test]
    fn test_read_past_chunk_end() {
        let data = chunk(0x0030, &[50, 0]);
        let mut src = StreamSource::from_bytes(data);
        let mut reader = ChunkReader::new(&mut src).unwrap();
        reader.open().unwrap();
        assert!(reader.read_f32().is_err());
    }
}
