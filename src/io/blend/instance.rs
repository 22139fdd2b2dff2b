//! Reflective access to one struct instance inside a block payload

use super::dna::{Dna, FieldDef, StructDef};
use crate::io::source::Endian;

/// A struct instance viewed through its DNA definition.
///
/// Every accessor looks the field up by name and decodes it according to
/// the field's declared type, so the same code reads any struct version a
/// file was written with. Missing fields read as `None`.
#[derive(Clone, Copy)]
pub struct Instance<'a> {
    dna: &'a Dna,
    def: &'a StructDef,
    data: &'a [u8],
    endian: Endian,
}

impl std::fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("struct", &self.def.name)
            .field("size", &self.def.size)
            .finish()
    }
}

/// Decode one scalar of a primitive DNA type
fn read_scalar(type_name: &str, endian: Endian, buf: &[u8]) -> Option<f64> {
    let value = match type_name {
        "char" | "uchar" | "uint8_t" => *buf.first()? as f64,
        "int8_t" => *buf.first()? as i8 as f64,
        "short" => endian.read_i16(buf.get(..2)?) as f64,
        "ushort" | "uint16_t" => endian.read_u16(buf.get(..2)?) as f64,
        "int" | "long" | "int32_t" => endian.read_i32(buf.get(..4)?) as f64,
        "uint" | "ulong" | "uint32_t" => endian.read_u32(buf.get(..4)?) as f64,
        "float" => endian.read_f32(buf.get(..4)?) as f64,
        "double" => endian.read_f64(buf.get(..8)?),
        "int64_t" => endian.read_u64(buf.get(..8)?) as i64 as f64,
        "uint64_t" => endian.read_u64(buf.get(..8)?) as f64,
        _ => return None,
    };
    Some(value)
}

/// Read a pointer of 4 or 8 bytes; 0 is null
pub fn read_pointer(endian: Endian, buf: &[u8]) -> Option<u64> {
    match buf.len() {
        4 => Some(endian.read_u32(buf) as u64),
        8 => Some(endian.read_u64(buf)),
        _ => None,
    }
}

impl<'a> Instance<'a> {
    /// View `data` as an instance of `def`; `None` if it is too short
    pub fn new(dna: &'a Dna, def: &'a StructDef, data: &'a [u8], endian: Endian) -> Option<Self> {
        (data.len() >= def.size).then_some(Self {
            dna,
            def,
            data,
            endian,
        })
    }

    pub fn struct_name(&self) -> &'a str {
        &self.def.name
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.def.has_field(name)
    }

    fn field(&self, name: &str) -> Option<(&'a FieldDef, &'a [u8])> {
        let field = self.def.field(name)?;
        let bytes = self.data.get(field.offset..field.offset + field.size)?;
        Some((field, bytes))
    }

    /// All elements of a numeric field, flattened
    pub fn numbers(&self, name: &str) -> Option<Vec<f64>> {
        let (field, bytes) = self.field(name)?;
        if field.pointer {
            return None;
        }
        bytes
            .chunks_exact(field.element_size)
            .map(|chunk| read_scalar(&field.type_name, self.endian, chunk))
            .collect()
    }

    /// First element of a numeric field
    pub fn number(&self, name: &str) -> Option<f64> {
        let (field, bytes) = self.field(name)?;
        if field.pointer {
            return None;
        }
        read_scalar(&field.type_name, self.endian, bytes)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.number(name).map(|v| v as i64)
    }

    /// Pointer field as the old memory address
    pub fn pointer(&self, name: &str) -> Option<u64> {
        let (field, bytes) = self.field(name)?;
        if !field.pointer {
            return None;
        }
        read_pointer(self.endian, bytes.get(..field.element_size)?)
    }

    /// `char` array up to its terminator
    pub fn text(&self, name: &str) -> Option<String> {
        let (field, bytes) = self.field(name)?;
        if field.pointer || field.type_name != "char" {
            return None;
        }
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Some(crate::io::source::decode_latin1(&bytes[..end]))
    }

    /// Embedded (by value) struct field
    pub fn child(&self, name: &str) -> Option<Instance<'a>> {
        let (field, bytes) = self.field(name)?;
        if field.pointer {
            return None;
        }
        let def = self.dna.struct_def(&field.type_name)?;
        Instance::new(self.dna, def, bytes, self.endian)
    }

    /// Datablock name from the embedded `ID`, without its two-letter code
    pub fn id_name(&self) -> Option<String> {
        let name = self.child("id")?.text("name")?;
        Some(name.get(2..).unwrap_or_default().to_string())
    }
}
