//! Byte and line sources consumed by the decoders

use crate::error::{ImportError, Location, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use encoding_rs::Encoding;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

/// Sequential/random-access input for a decoder.
///
/// Short reads are reported as [`ImportError::TruncatedInput`] by the
/// fixed-size helpers, never as silently shortened data.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes, returning how many were read (0 at EOF)
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move to an absolute offset
    fn seek(&mut self, offset: u64) -> Result<()>;

    /// Current absolute offset
    fn tell(&mut self) -> Result<u64>;

    /// Total length of the source in bytes
    fn stream_len(&mut self) -> Result<u64>;

    /// Read one text line without its terminator, `None` at EOF
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Fill `buf` completely
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.tell()?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(ImportError::truncated(
                    Location::Offset(start),
                    format!("needed {} bytes, {} available", buf.len(), filled),
                ));
            }
            filled += n;
        }
        Ok(())
    }

    /// Read exactly `len` bytes into a new buffer
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let start = self.tell()?;
        let remaining = self.stream_len()?.saturating_sub(start);
        if len as u64 > remaining {
            return Err(ImportError::truncated(
                Location::Offset(start),
                format!("needed {len} bytes, {remaining} available"),
            ));
        }
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read the rest of the source
    fn read_to_end(&mut self) -> Result<Vec<u8>> {
        let start = self.tell()?;
        let len = self.stream_len()?.saturating_sub(start);
        self.read_vec(len as usize)
    }

    /// Advance by `count` bytes
    fn skip(&mut self, count: u64) -> Result<()> {
        let position = self.tell()?;
        self.seek(position + count)
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(LittleEndian::read_u16(&buf))
    }

    fn read_i16_le(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(LittleEndian::read_i16(&buf))
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(LittleEndian::read_u32(&buf))
    }

    fn read_i32_le(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(LittleEndian::read_i32(&buf))
    }

    fn read_f32_le(&mut self) -> Result<f32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(LittleEndian::read_f32(&buf))
    }

    /// Read a NUL-terminated string of at most `max` bytes (terminator
    /// included). Non-UTF-8 bytes are mapped as Latin-1.
    fn read_cstring(&mut self, max: usize) -> Result<String> {
        let start = self.tell()?;
        let mut bytes = Vec::new();
        loop {
            if bytes.len() >= max {
                return Err(ImportError::malformed(
                    Location::Offset(start),
                    format!("unterminated string longer than {max} bytes"),
                ));
            }
            match self.read_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(decode_latin1(&bytes))
    }
}

/// Decode bytes as UTF-8, falling back to a 1:1 Latin-1 mapping
pub fn decode_latin1(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// [`ByteSource`] over any seekable reader
pub struct StreamSource<R: Read + Seek> {
    reader: BufReader<R>,
    len: Option<u64>,
    /// Fallback encoding for lines that are not valid UTF-8
    encoding: &'static Encoding,
}

impl<R: Read + Seek> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            len: None,
            encoding: encoding_rs::WINDOWS_1252,
        }
    }

    /// Set the fallback encoding for non-UTF-8 text lines
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl StreamSource<Cursor<Vec<u8>>> {
    /// Source over an in-memory buffer
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Cursor::new(bytes.into()))
    }
}

impl StreamSource<File> {
    /// Open a file for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read + Seek> ByteSource for StreamSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.reader.read(buf)?)
    }

    fn seek(&mut self, offset: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.reader.stream_position()?)
    }

    fn stream_len(&mut self) -> Result<u64> {
        if let Some(len) = self.len {
            return Ok(len);
        }
        let position = self.reader.stream_position()?;
        let len = self.reader.seek(SeekFrom::End(0))?;
        self.reader.seek(SeekFrom::Start(position))?;
        self.len = Some(len);
        Ok(len)
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut bytes = Vec::new();
        if self.reader.read_until(b'\n', &mut bytes)? == 0 {
            return Ok(None);
        }
        while matches!(bytes.last(), Some(b'\n') | Some(b'\r')) {
            bytes.pop();
        }
        let line = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                let (decoded, _, _) = self.encoding.decode(e.as_bytes());
                decoded.into_owned()
            }
        };
        Ok(Some(line))
    }
}

/// Byte order of a binary file, decided at run time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(buf),
            Endian::Big => BigEndian::read_u16(buf),
        }
    }

    pub fn read_i16(self, buf: &[u8]) -> i16 {
        self.read_u16(buf) as i16
    }

    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(buf),
            Endian::Big => BigEndian::read_u32(buf),
        }
    }

    pub fn read_i32(self, buf: &[u8]) -> i32 {
        self.read_u32(buf) as i32
    }

    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            Endian::Little => LittleEndian::read_u64(buf),
            Endian::Big => BigEndian::read_u64(buf),
        }
    }

    pub fn read_f32(self, buf: &[u8]) -> f32 {
        f32::from_bits(self.read_u32(buf))
    }

    pub fn read_f64(self, buf: &[u8]) -> f64 {
        f64::from_bits(self.read_u64(buf))
    }
}
