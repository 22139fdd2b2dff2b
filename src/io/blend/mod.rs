//! Blender (.blend) decoder
//!
//! A blend file is a 12 byte header followed by framed blocks:
//!
//! ```text
//! code[4] len:i32 old_address:ptr sdna_index:i32 count:i32 payload[len]
//! ```
//!
//! Pointer size (4 or 8) and byte order come from the header and apply to
//! every read. The `DNA1` block carries the schema ([`dna`]) that gives
//! meaning to every other block; `ENDB` ends the file. Gzip compressed
//! files are inflated first.

pub mod dna;
pub mod instance;
mod mapping;

pub use dna::{Declarator, Dna, FieldDef, StructDef};
pub use instance::Instance;

use crate::error::{ImportError, Location, Result};
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::{ByteSource, Endian};
use crate::notification::NotificationType;
use crate::scene::SceneBuilder;
use ahash::AHashMap;
use flate2::read::GzDecoder;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const HEADER_SIZE: usize = 12;

pub const DNA1: [u8; 4] = *b"DNA1";
pub const ENDB: [u8; 4] = *b"ENDB";

/// Bounds-checked reader over an in-memory payload
pub(crate) struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
    /// File offset of `data[0]`, for error locations
    base: u64,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8], endian: Endian, base: u64) -> Self {
        Self {
            data,
            pos: 0,
            endian,
            base,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn location(&self) -> Location {
        Location::Offset(self.base + self.pos as u64)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let bytes = self.data.get(self.pos..self.pos + len).ok_or_else(|| {
            ImportError::truncated(
                self.location(),
                format!("needed {len} bytes, {} available", self.remaining()),
            )
        })?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let endian = self.endian;
        Ok(endian.read_u16(self.read_bytes(2)?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let endian = self.endian;
        Ok(endian.read_u32(self.read_bytes(4)?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let endian = self.endian;
        Ok(endian.read_i32(self.read_bytes(4)?))
    }

    pub fn read_pointer(&mut self, size: usize) -> Result<u64> {
        let endian = self.endian;
        let bytes = self.read_bytes(size)?;
        instance::read_pointer(endian, bytes)
            .ok_or_else(|| ImportError::malformed(self.location(), format!("{size} byte pointer")))
    }

    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ImportError::truncated(self.location(), "unterminated string"))?;
        self.pos += end + 1;
        Ok(crate::io::source::decode_latin1(&rest[..end]))
    }

    pub fn expect_tag(&mut self, tag: &[u8; 4]) -> Result<()> {
        let location = self.location();
        let found = self.read_bytes(4)?;
        if found != tag {
            return Err(ImportError::malformed(
                location,
                format!(
                    "expected '{}', found '{}'",
                    String::from_utf8_lossy(tag),
                    String::from_utf8_lossy(found)
                ),
            ));
        }
        Ok(())
    }

    pub fn align4(&mut self) {
        self.pos = (self.pos + 3) & !3;
    }
}

/// File-global parameters from the 12 byte header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendHeader {
    pub pointer_size: usize,
    pub endian: Endian,
    /// Version digits, e.g. 279 for 2.79
    pub version: u32,
}

impl BlendHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let header = bytes
            .get(..HEADER_SIZE)
            .ok_or_else(|| ImportError::MalformedHeader("file shorter than header".to_string()))?;
        if &header[..7] != b"BLENDER" {
            return Err(ImportError::MalformedHeader("missing BLENDER magic".to_string()));
        }
        let pointer_size = match header[7] {
            b'_' => 4,
            b'-' => 8,
            other => {
                return Err(ImportError::MalformedHeader(format!(
                    "pointer size marker '{}'",
                    other as char
                )))
            }
        };
        let endian = match header[8] {
            b'v' => Endian::Little,
            b'V' => Endian::Big,
            other => {
                return Err(ImportError::MalformedHeader(format!(
                    "endianness marker '{}'",
                    other as char
                )))
            }
        };
        let version = std::str::from_utf8(&header[9..12])
            .ok()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ImportError::MalformedHeader("bad version digits".to_string()))?;
        Ok(Self {
            pointer_size,
            endian,
            version,
        })
    }

    /// Size of a block header for this pointer size
    pub fn block_header_size(&self) -> usize {
        16 + self.pointer_size
    }
}

/// One framed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub code: [u8; 4],
    pub old_address: u64,
    pub sdna_index: usize,
    pub count: usize,
    /// Payload position in the file data
    pub offset: usize,
    pub len: usize,
}

impl Block {
    /// Block code without NUL padding, e.g. `OB`
    pub fn code_str(&self) -> String {
        String::from_utf8_lossy(&self.code)
            .trim_end_matches('\0')
            .to_string()
    }
}

/// A parsed file: raw data, block table, schema and pointer index
pub struct BlendFile {
    pub header: BlendHeader,
    pub blocks: Vec<Block>,
    pub dna: Dna,
    data: Vec<u8>,
    by_address: AHashMap<u64, usize>,
    terminated: bool,
}

impl BlendFile {
    /// Parse `data`, inflating it first when gzip compressed
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let data = if data.starts_with(&GZIP_MAGIC) {
            let mut inflated = Vec::new();
            GzDecoder::new(data.as_slice()).read_to_end(&mut inflated)?;
            log::debug!("inflated blend: {} -> {} bytes", data.len(), inflated.len());
            inflated
        } else if data.starts_with(&ZSTD_MAGIC) {
            return Err(ImportError::UnsupportedFormat(
                "zstd compressed blend file".to_string(),
            ));
        } else {
            data
        };

        let header = BlendHeader::parse(&data)?;
        let head_size = header.block_header_size();
        let mut blocks = Vec::new();
        let mut dna = None;
        let mut terminated = false;
        let mut pos = HEADER_SIZE;

        while pos < data.len() {
            let mut reader = SliceReader::new(&data[pos..], header.endian, pos as u64);
            if reader.remaining() < head_size {
                return Err(ImportError::truncated(
                    Location::Offset(pos as u64),
                    format!("block header needs {head_size} bytes"),
                ));
            }
            let code: [u8; 4] = reader
                .read_bytes(4)?
                .try_into()
                .map_err(|_| ImportError::malformed(Location::Offset(pos as u64), "block code"))?;
            let len = reader.read_i32()?;
            let old_address = reader.read_pointer(header.pointer_size)?;
            let sdna_index = reader.read_u32()? as usize;
            let count = reader.read_u32()? as usize;
            if code == ENDB {
                terminated = true;
                break;
            }

            let len = usize::try_from(len).map_err(|_| {
                ImportError::malformed(Location::Offset(pos as u64), format!("negative block length {len}"))
            })?;
            let offset = pos + reader.position();
            if len > data.len() - offset {
                return Err(ImportError::truncated(
                    Location::Offset(pos as u64),
                    format!(
                        "block '{}' declares {len} bytes, {} available",
                        String::from_utf8_lossy(&code),
                        data.len() - offset
                    ),
                ));
            }
            if code == DNA1 {
                dna = Some(Dna::parse(
                    &data[offset..offset + len],
                    header.endian,
                    header.pointer_size,
                )?);
            }
            blocks.push(Block {
                code,
                old_address,
                sdna_index,
                count,
                offset,
                len,
            });
            pos = offset + len;
        }

        let dna = dna.ok_or_else(|| ImportError::MissingSchema("no DNA1 block".to_string()))?;
        let by_address = blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.old_address != 0)
            .map(|(i, b)| (b.old_address, i))
            .collect();
        log::debug!(
            "blend v{}: {} blocks, {} structs, {} byte pointers",
            header.version,
            blocks.len(),
            dna.structs.len(),
            header.pointer_size
        );

        Ok(Self {
            header,
            blocks,
            dna,
            data,
            by_address,
            terminated,
        })
    }

    /// Whether the file ended with an `ENDB` block
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn payload(&self, block: &Block) -> &[u8] {
        &self.data[block.offset..block.offset + block.len]
    }

    /// Struct definition a block's header declares
    pub fn struct_of(&self, block: &Block) -> Option<&StructDef> {
        self.dna.struct_at(block.sdna_index)
    }

    /// Every struct instance stored in `block`
    pub fn instances<'a>(&'a self, block: &'a Block) -> Vec<Instance<'a>> {
        let Some(def) = self.struct_of(block) else {
            return Vec::new();
        };
        if def.size == 0 {
            return Vec::new();
        }
        self.payload(block)
            .chunks_exact(def.size)
            .take(block.count)
            .filter_map(|chunk| Instance::new(&self.dna, def, chunk, self.header.endian))
            .collect()
    }

    /// Block starting at an old memory address
    pub fn block_at(&self, address: u64) -> Option<&Block> {
        self.by_address.get(&address).map(|&i| &self.blocks[i])
    }

    /// Instances of the block an address points to, checked against the
    /// expected struct name
    pub fn instances_at(&self, address: u64, struct_name: &str) -> Vec<Instance<'_>> {
        match self.block_at(address) {
            Some(block) => self
                .instances(block)
                .into_iter()
                .filter(|i| i.struct_name() == struct_name)
                .collect(),
            None => Vec::new(),
        }
    }

    /// First instance an address points to
    pub fn deref(&self, address: u64, struct_name: &str) -> Option<Instance<'_>> {
        if address == 0 {
            return None;
        }
        self.instances_at(address, struct_name).into_iter().next()
    }

    /// Raw pointer array stored in the block at `address`
    pub fn pointers_at(&self, address: u64, count: usize) -> Vec<u64> {
        let Some(block) = self.block_at(address) else {
            return Vec::new();
        };
        let size = self.header.pointer_size;
        self.payload(block)
            .chunks_exact(size)
            .take(count)
            .filter_map(|chunk| instance::read_pointer(self.header.endian, chunk))
            .collect()
    }

    /// Blocks with the given code, e.g. `b"OB\0\0"`
    pub fn blocks_with_code<'a>(&'a self, code: &'a [u8; 4]) -> impl Iterator<Item = &'a Block> {
        self.blocks.iter().filter(move |b| &b.code == code)
    }
}

/// Decoder for Blender files
#[derive(Debug, Default)]
pub struct BlendDecoder;

impl BlendDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for BlendDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Blend
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        let data = source.read_to_end()?;
        let file = BlendFile::parse(data)?;
        if !file.is_terminated() {
            builder.notify(NotificationType::Warning, Location::Unknown, "missing ENDB block");
        }
        mapping::SceneMapper::new(&file).map(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_variants() {
        let h = BlendHeader::parse(b"BLENDER-v279").unwrap();
        assert_eq!((h.pointer_size, h.endian, h.version), (8, Endian::Little, 279));
        assert_eq!(h.block_header_size(), 24);

        let h = BlendHeader::parse(b"BLENDER_V250").unwrap();
        assert_eq!((h.pointer_size, h.endian), (4, Endian::Big));

        assert!(matches!(
            BlendHeader::parse(b"BLENDOR-v279"),
            Err(ImportError::MalformedHeader(_))
        ));
        assert!(matches!(
            BlendHeader::parse(b"BLENDER*v279"),
            Err(ImportError::MalformedHeader(_))
        ));
    }

    fn block(code: &[u8; 4], address: u64, payload: &[u8]) -> Vec<u8> {
        let mut out = code.to_vec();
        out.extend_from_slice(&(payload.len() as i32).to_le_bytes());
        out.extend_from_slice(&address.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_missing_dna() {
        let mut data = b"BLENDER-v279".to_vec();
        data.extend(block(b"REND", 0, &[0; 8]));
        data.extend(block(b"ENDB", 0, &[]));
        assert!(matches!(
            BlendFile::parse(data),
            Err(ImportError::MissingSchema(_))
        ));
    }

    #[test]
    fn test_block_past_end() {
        let mut data = b"BLENDER-v279".to_vec();
        let mut b = block(b"DATA", 0x10, &[0; 8]);
        b.truncate(b.len() - 4);
        data.extend(b);
        assert!(matches!(
            BlendFile::parse(data),
            Err(ImportError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn test_gzip_is_inflated() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut data = b"BLENDER-v279".to_vec();
        data.extend(block(b"ENDB", 0, &[]));
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data).unwrap();
        let compressed = encoder.finish().unwrap();

        // header and framing are read from the inflated bytes
        assert!(matches!(
            BlendFile::parse(compressed),
            Err(ImportError::MissingSchema(_))
        ));
    }
}
