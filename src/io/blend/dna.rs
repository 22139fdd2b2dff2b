//! Structure DNA: the schema stored in a blend file's `DNA1` block.
//!
//! The block lists declarator names (`*next`, `co[3]`, `(*func)()`), type
//! names with their byte lengths, and for every struct its ordered
//! `(type, name)` field pairs. Field offsets are derived once here by
//! walking each struct in declaration order; decoding an instance later is
//! a table lookup.

use super::SliceReader;
use crate::error::{ImportError, Result};
use crate::io::source::Endian;
use indexmap::IndexMap;
use nom::branch::alt;
use nom::bytes::complete::{take_until, take_while1};
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map, map_res};
use nom::multi::{many0, many0_count, many1_count};
use nom::sequence::{delimited, tuple};
use nom::IResult;

/// A parsed C declarator from the names table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarator {
    /// Bare identifier
    pub name: String,
    /// Leading `*`, or a function pointer
    pub pointer: bool,
    /// Array dimensions, outermost first
    pub dims: Vec<usize>,
}

impl Declarator {
    /// Number of elements; 1 for a non-array field
    pub fn array_len(&self) -> usize {
        self.dims.iter().product()
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

fn dimension(input: &str) -> IResult<&str, usize> {
    delimited(char('['), map_res(digit1, str::parse), char(']'))(input)
}

/// `(*name)(args)`
fn function_pointer(input: &str) -> IResult<&str, Declarator> {
    map(
        tuple((
            char('('),
            many1_count(char('*')),
            identifier,
            char(')'),
            char('('),
            take_until(")"),
            char(')'),
        )),
        |(_, _, name, ..)| Declarator {
            name: name.to_string(),
            pointer: true,
            dims: Vec::new(),
        },
    )(input)
}

/// `**name[2][3]`
fn field(input: &str) -> IResult<&str, Declarator> {
    map(
        tuple((many0_count(char('*')), identifier, many0(dimension))),
        |(stars, name, dims)| Declarator {
            name: name.to_string(),
            pointer: stars > 0,
            dims,
        },
    )(input)
}

pub fn parse_declarator(text: &str) -> Option<Declarator> {
    all_consuming(alt((function_pointer, field)))(text)
        .ok()
        .map(|(_, declarator)| declarator)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    pub name: String,
    pub size: usize,
}

/// One field of a struct with its resolved layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
    pub pointer: bool,
    pub dims: Vec<usize>,
    pub offset: usize,
    /// Size of one element (the pointer size for pointer fields)
    pub element_size: usize,
    /// Size of the whole field
    pub size: usize,
}

impl FieldDef {
    pub fn array_len(&self) -> usize {
        self.dims.iter().product()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDef {
    pub name: String,
    pub size: usize,
    pub fields: IndexMap<String, FieldDef>,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// The schema registry of one file
#[derive(Debug, Clone, Default)]
pub struct Dna {
    pub names: Vec<Declarator>,
    pub types: Vec<TypeDef>,
    /// Structs by name, in table order; block headers index this order
    pub structs: IndexMap<String, StructDef>,
    pub pointer_size: usize,
}

fn schema_error(message: impl Into<String>) -> ImportError {
    ImportError::MissingSchema(message.into())
}

impl Dna {
    /// Parse the payload of a `DNA1` block
    pub fn parse(payload: &[u8], endian: Endian, pointer_size: usize) -> Result<Self> {
        let mut reader = SliceReader::new(payload, endian, 0);
        let read = |r: &mut SliceReader<'_>| -> Result<Self> {
            r.expect_tag(b"SDNA")?;

            r.expect_tag(b"NAME")?;
            let count = r.read_u32()? as usize;
            let mut names = Vec::with_capacity(count.min(1 << 16));
            for _ in 0..count {
                let text = r.read_cstring()?;
                let declarator = parse_declarator(&text)
                    .ok_or_else(|| schema_error(format!("unparsable field name '{text}'")))?;
                names.push(declarator);
            }
            r.align4();

            r.expect_tag(b"TYPE")?;
            let count = r.read_u32()? as usize;
            let mut type_names = Vec::with_capacity(count.min(1 << 16));
            for _ in 0..count {
                type_names.push(r.read_cstring()?);
            }
            r.align4();

            r.expect_tag(b"TLEN")?;
            let mut types = Vec::with_capacity(type_names.len());
            for name in type_names {
                let size = r.read_u16()? as usize;
                types.push(TypeDef { name, size });
            }
            r.align4();

            r.expect_tag(b"STRC")?;
            let count = r.read_u32()? as usize;
            let mut raw = Vec::with_capacity(count.min(1 << 16));
            for _ in 0..count {
                let type_index = r.read_u16()? as usize;
                let field_count = r.read_u16()? as usize;
                let mut fields = Vec::with_capacity(field_count);
                for _ in 0..field_count {
                    fields.push((r.read_u16()? as usize, r.read_u16()? as usize));
                }
                raw.push((type_index, fields));
            }

            let mut dna = Dna {
                names,
                types,
                structs: IndexMap::with_capacity(raw.len()),
                pointer_size,
            };
            for (type_index, fields) in raw {
                let def = dna.layout(type_index, &fields)?;
                dna.structs.insert(def.name.clone(), def);
            }
            Ok(dna)
        };
        read(&mut reader).map_err(|err| match err {
            ImportError::MissingSchema(_) => err,
            other => schema_error(format!("unreadable DNA block: {other}")),
        })
    }

    /// Compute field offsets for one struct
    fn layout(&self, type_index: usize, fields: &[(usize, usize)]) -> Result<StructDef> {
        let ty = self
            .types
            .get(type_index)
            .ok_or_else(|| schema_error(format!("struct type index {type_index} out of range")))?;

        let mut offset = 0;
        let mut defs = IndexMap::with_capacity(fields.len());
        for &(field_type, name_index) in fields {
            let field_ty = self.types.get(field_type).ok_or_else(|| {
                schema_error(format!("{}: field type index {field_type} out of range", ty.name))
            })?;
            let name = self.names.get(name_index).ok_or_else(|| {
                schema_error(format!("{}: field name index {name_index} out of range", ty.name))
            })?;
            let element_size = if name.pointer {
                self.pointer_size
            } else {
                field_ty.size
            };
            let size = element_size * name.array_len();
            defs.insert(
                name.name.clone(),
                FieldDef {
                    name: name.name.clone(),
                    type_name: field_ty.name.clone(),
                    pointer: name.pointer,
                    dims: name.dims.clone(),
                    offset,
                    element_size,
                    size,
                },
            );
            offset += size;
        }

        if offset != ty.size {
            return Err(schema_error(format!(
                "struct {} fields span {offset} bytes, type length is {}",
                ty.name, ty.size
            )));
        }
        Ok(StructDef {
            name: ty.name.clone(),
            size: offset,
            fields: defs,
        })
    }

    pub fn struct_def(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    /// Struct by the index stored in block headers
    pub fn struct_at(&self, index: usize) -> Option<&StructDef> {
        self.structs.get_index(index).map(|(_, def)| def)
    }

    pub fn type_size(&self, name: &str) -> Option<usize> {
        self.types.iter().find(|t| t.name == name).map(|t| t.size)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Little-endian DNA block from names, `(type, length)` pairs and
    /// structs of `(type index, [(field type, name index)])`
    pub(crate) fn dna_block(
        names: &[&str],
        types: &[(&str, u16)],
        structs: &[(u16, &[(u16, u16)])],
    ) -> Vec<u8> {
        fn pad(out: &mut Vec<u8>) {
            while out.len() % 4 != 0 {
                out.push(0);
            }
        }
        let mut out = b"SDNANAME".to_vec();
        out.extend_from_slice(&(names.len() as u32).to_le_bytes());
        for name in names {
            out.extend_from_slice(name.as_bytes());
            out.push(0);
        }
        pad(&mut out);
        out.extend_from_slice(b"TYPE");
        out.extend_from_slice(&(types.len() as u32).to_le_bytes());
        for (name, _) in types {
            out.extend_from_slice(name.as_bytes());
            out.push(0);
        }
        pad(&mut out);
        out.extend_from_slice(b"TLEN");
        for (_, len) in types {
            out.extend_from_slice(&len.to_le_bytes());
        }
        pad(&mut out);
        out.extend_from_slice(b"STRC");
        out.extend_from_slice(&(structs.len() as u32).to_le_bytes());
        for (ty, fields) in structs {
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(&(fields.len() as u16).to_le_bytes());
            for (field_type, name) in *fields {
                out.extend_from_slice(&field_type.to_le_bytes());
                out.extend_from_slice(&name.to_le_bytes());
            }
        }
        out
    }

    #[test]
    fn test_offsets_int_and_float_array() {
        let block = dna_block(
            &["a", "b[3]"],
            &[("int", 4), ("float", 4), ("Pair", 16)],
            &[(2, &[(0, 0), (1, 1)])],
        );
        let dna = Dna::parse(&block, Endian::Little, 8).unwrap();
        let pair = dna.struct_def("Pair").unwrap();
        assert_eq!(pair.field("a").unwrap().offset, 0);
        assert_eq!(pair.field("b").unwrap().offset, 4);
        assert_eq!(pair.field("b").unwrap().array_len(), 3);
        assert_eq!(pair.size, 16);
    }

    #[test]
    fn test_pointer_size_from_header() {
        let block = dna_block(
            &["*next", "v"],
            &[("Link", 12), ("int", 4)],
            &[(0, &[(0, 0), (1, 1)])],
        );
        let dna = Dna::parse(&block, Endian::Little, 8).unwrap();
        let link = dna.struct_at(0).unwrap();
        assert_eq!(link.field("v").unwrap().offset, 8);
        assert!(link.field("next").unwrap().pointer);

        let narrow = dna_block(
            &["*next", "v"],
            &[("Link", 8), ("int", 4)],
            &[(0, &[(0, 0), (1, 1)])],
        );
        let dna = Dna::parse(&narrow, Endian::Little, 4).unwrap();
        assert_eq!(dna.struct_def("Link").unwrap().field("v").unwrap().offset, 4);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let block = dna_block(&["a"], &[("int", 4), ("Bad", 8)], &[(1, &[(0, 0)])]);
        assert!(matches!(
            Dna::parse(&block, Endian::Little, 8),
            Err(ImportError::MissingSchema(_))
        ));
    }

    #[test]
    fn test_truncated_block_is_missing_schema() {
        let block = dna_block(&["a"], &[("int", 4)], &[]);
        assert!(matches!(
            Dna::parse(&block[..10], Endian::Little, 8),
            Err(ImportError::MissingSchema(_))
        ));
    }

    #[test]
    fn test_declarators() {
        assert_eq!(
            parse_declarator("*next"),
            Some(Declarator { name: "next".into(), pointer: true, dims: vec![] })
        );
        assert_eq!(
            parse_declarator("mat[4][4]"),
            Some(Declarator { name: "mat".into(), pointer: false, dims: vec![4, 4] })
        );
        assert_eq!(
            parse_declarator("(*free_data)(void *)"),
            Some(Declarator { name: "free_data".into(), pointer: true, dims: vec![] })
        );
        assert_eq!(parse_declarator("**mat").map(|d| d.pointer), Some(true));
        assert_eq!(parse_declarator("co[3"), None);
    }
}
