//! Stanford polygon (.ply) decoder
//!
//! The header declares elements with typed properties; the body stores
//! them either as whitespace separated text or as packed binary in either
//! byte order. `vertex` and `face` elements are mapped, every other element
//! is read past.

use crate::error::{ImportError, Location, Result};
use crate::io::format::FormatTag;
use crate::io::importer::Decoder;
use crate::io::source::{ByteSource, Endian};
use crate::notification::NotificationType;
use crate::scene::SceneBuilder;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{digit1, space0, space1};
use nom::combinator::{all_consuming, map, map_res, value};
use nom::sequence::{preceded, terminated, tuple};
use nom::IResult;

/// Property storage type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl ScalarType {
    pub fn size(self) -> usize {
        match self {
            ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::F64 => 8,
        }
    }

    fn decode(self, endian: Endian, buf: &[u8]) -> f64 {
        match self {
            ScalarType::I8 => buf[0] as i8 as f64,
            ScalarType::U8 => buf[0] as f64,
            ScalarType::I16 => endian.read_i16(buf) as f64,
            ScalarType::U16 => endian.read_u16(buf) as f64,
            ScalarType::I32 => endian.read_i32(buf) as f64,
            ScalarType::U32 => endian.read_u32(buf) as f64,
            ScalarType::F32 => endian.read_f32(buf) as f64,
            ScalarType::F64 => endian.read_f64(buf),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Scalar { name: String, ty: ScalarType },
    List { name: String, count: ScalarType, item: ScalarType },
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Scalar { name, .. } | Property::List { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub count: usize,
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Ascii,
    Binary(Endian),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub encoding: BodyEncoding,
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq)]
enum HeaderLine {
    Format(BodyEncoding),
    Element(String, usize),
    Property(Property),
    Comment,
    End,
}

fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn scalar_type(input: &str) -> IResult<&str, ScalarType> {
    alt((
        value(ScalarType::I8, alt((tag("int8"), tag("char")))),
        value(ScalarType::U8, alt((tag("uint8"), tag("uchar")))),
        value(ScalarType::I16, alt((tag("int16"), tag("short")))),
        value(ScalarType::U16, alt((tag("uint16"), tag("ushort")))),
        value(ScalarType::I32, alt((tag("int32"), tag("int")))),
        value(ScalarType::U32, alt((tag("uint32"), tag("uint")))),
        value(ScalarType::F32, alt((tag("float32"), tag("float")))),
        value(ScalarType::F64, alt((tag("float64"), tag("double")))),
    ))(input)
}

fn count(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse)(input)
}

fn header_line(input: &str) -> IResult<&str, HeaderLine> {
    all_consuming(terminated(
        alt((
            map(
                preceded(
                    tuple((tag("format"), space1)),
                    terminated(
                        alt((
                            value(BodyEncoding::Ascii, tag("ascii")),
                            value(
                                BodyEncoding::Binary(Endian::Little),
                                tag("binary_little_endian"),
                            ),
                            value(BodyEncoding::Binary(Endian::Big), tag("binary_big_endian")),
                        )),
                        tuple((space1, identifier)),
                    ),
                ),
                HeaderLine::Format,
            ),
            map(
                tuple((tag("element"), space1, identifier, space1, count)),
                |(_, _, name, _, n)| HeaderLine::Element(name.to_string(), n),
            ),
            map(
                tuple((
                    tag("property"),
                    space1,
                    tag("list"),
                    space1,
                    scalar_type,
                    space1,
                    scalar_type,
                    space1,
                    identifier,
                )),
                |(_, _, _, _, count, _, item, _, name)| {
                    HeaderLine::Property(Property::List {
                        name: name.to_string(),
                        count,
                        item,
                    })
                },
            ),
            map(
                tuple((tag("property"), space1, scalar_type, space1, identifier)),
                |(_, _, ty, _, name)| {
                    HeaderLine::Property(Property::Scalar {
                        name: name.to_string(),
                        ty,
                    })
                },
            ),
            value(HeaderLine::End, tag("end_header")),
        )),
        space0,
    ))(input)
}

/// Classify one header line; `comment` and `obj_info` lines carry free text
fn parse_header_line(line: &str) -> Option<HeaderLine> {
    let line = line.trim();
    if line.starts_with("comment") || line.starts_with("obj_info") {
        return Some(HeaderLine::Comment);
    }
    header_line(line).ok().map(|(_, parsed)| parsed)
}

/// Read the header, leaving `source` at the first body byte
pub fn read_header(source: &mut dyn ByteSource) -> Result<Header> {
    match source.read_line()? {
        Some(magic) if magic.trim() == "ply" => {}
        _ => return Err(ImportError::MalformedHeader("missing 'ply' magic".to_string())),
    }

    let mut encoding = None;
    let mut elements: Vec<Element> = Vec::new();
    let mut line_no = 1;
    loop {
        line_no += 1;
        let Some(line) = source.read_line()? else {
            return Err(ImportError::truncated(Location::Line(line_no), "header without end_header"));
        };
        let parsed = parse_header_line(&line).ok_or_else(|| {
            ImportError::MalformedHeader(format!("line {line_no}: cannot parse '{line}'"))
        })?;
        match parsed {
            HeaderLine::Format(e) => encoding = Some(e),
            HeaderLine::Element(name, count) => elements.push(Element {
                name,
                count,
                properties: Vec::new(),
            }),
            HeaderLine::Property(property) => match elements.last_mut() {
                Some(element) => element.properties.push(property),
                None => {
                    return Err(ImportError::MalformedHeader(format!(
                        "line {line_no}: property before any element"
                    )))
                }
            },
            HeaderLine::Comment => {}
            HeaderLine::End => break,
        }
    }

    let encoding =
        encoding.ok_or_else(|| ImportError::MalformedHeader("missing format line".to_string()))?;
    Ok(Header { encoding, elements })
}

/// Sequential access to body values regardless of encoding
trait ValueReader {
    fn next(&mut self, ty: ScalarType) -> Result<f64>;
}

struct AsciiValues<'a> {
    tokens: std::str::SplitWhitespace<'a>,
    offset: u64,
}

impl ValueReader for AsciiValues<'_> {
    fn next(&mut self, _ty: ScalarType) -> Result<f64> {
        let token = self
            .tokens
            .next()
            .ok_or_else(|| ImportError::truncated(Location::Offset(self.offset), "body ends early"))?;
        token.parse().map_err(|_| {
            ImportError::malformed(Location::Offset(self.offset), format!("bad value '{token}'"))
        })
    }
}

struct BinaryValues<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
    offset: u64,
}

impl ValueReader for BinaryValues<'_> {
    fn next(&mut self, ty: ScalarType) -> Result<f64> {
        let end = self.pos + ty.size();
        let buf = self.data.get(self.pos..end).ok_or_else(|| {
            ImportError::truncated(
                Location::Offset(self.offset + self.pos as u64),
                format!("{} bytes declared past end of body", ty.size()),
            )
        })?;
        self.pos = end;
        Ok(ty.decode(self.endian, buf))
    }
}

/// One decoded element row
enum Value {
    Scalar(f64),
    List(Vec<f64>),
}

/// List values as vertex indices; `None` if any is negative or fractional
fn vertex_indices(values: &[f64]) -> Option<Vec<usize>> {
    values
        .iter()
        .map(|&c| (c >= 0.0 && c.fract() == 0.0).then_some(c as usize))
        .collect()
}

fn read_row(values: &mut dyn ValueReader, element: &Element) -> Result<Vec<Value>> {
    element
        .properties
        .iter()
        .map(|property| match property {
            Property::Scalar { ty, .. } => Ok(Value::Scalar(values.next(*ty)?)),
            Property::List { count, item, .. } => {
                let n = values.next(*count)? as usize;
                (0..n)
                    .map(|_| values.next(*item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
        })
        .collect()
}

fn position(element: &Element, names: &[&str]) -> Option<usize> {
    element
        .properties
        .iter()
        .position(|p| names.contains(&p.name()))
}

fn scalar(row: &[Value], index: Option<usize>) -> Option<f64> {
    match row.get(index?)? {
        Value::Scalar(v) => Some(*v),
        Value::List(_) => None,
    }
}

/// Decoder for Stanford polygon files
#[derive(Debug, Default)]
pub struct PlyDecoder {
    textured: bool,
}

impl PlyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_body(
        &mut self,
        header: &Header,
        values: &mut dyn ValueReader,
        builder: &mut SceneBuilder<'_>,
    ) -> Result<()> {
        for element in &header.elements {
            match element.name.as_str() {
                "vertex" => self.read_vertices(element, values, builder)?,
                "face" => self.read_faces(element, values, builder)?,
                other => {
                    builder.notify(
                        NotificationType::Skipped,
                        Location::Unknown,
                        format!("element '{other}' ({} rows)", element.count),
                    );
                    for _ in 0..element.count {
                        read_row(values, element)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn read_vertices(
        &mut self,
        element: &Element,
        values: &mut dyn ValueReader,
        builder: &mut SceneBuilder<'_>,
    ) -> Result<()> {
        let x = position(element, &["x"]);
        let y = position(element, &["y"]);
        let z = position(element, &["z"]);
        let u = position(element, &["u", "s", "texture_u"]);
        let v = position(element, &["v", "t", "texture_v"]);
        if x.is_none() || y.is_none() || z.is_none() {
            return Err(ImportError::MalformedHeader(
                "vertex element without x, y and z".to_string(),
            ));
        }
        self.textured = u.is_some() && v.is_some();

        for _ in 0..element.count {
            let row = read_row(values, element)?;
            builder.add_vertex(
                scalar(&row, x).unwrap_or_default(),
                scalar(&row, y).unwrap_or_default(),
                scalar(&row, z).unwrap_or_default(),
            );
            if self.textured {
                builder.add_texture_point(
                    scalar(&row, u).unwrap_or_default(),
                    scalar(&row, v).unwrap_or_default(),
                );
            }
        }
        Ok(())
    }

    fn read_faces(
        &mut self,
        element: &Element,
        values: &mut dyn ValueReader,
        builder: &mut SceneBuilder<'_>,
    ) -> Result<()> {
        let indices = position(element, &["vertex_indices", "vertex_index"]).ok_or_else(|| {
            ImportError::MalformedHeader("face element without vertex_indices".to_string())
        })?;

        for row_index in 0..element.count {
            let row = read_row(values, element)?;
            let Some(Value::List(corners)) = row.get(indices) else {
                return Err(ImportError::MalformedHeader(
                    "vertex_indices is not a list property".to_string(),
                ));
            };
            let Some(corners) = vertex_indices(corners) else {
                let err = ImportError::unresolved(
                    Location::Unknown,
                    format!("face {row_index} corners {corners:?}"),
                );
                builder.recover(Err(err), Location::Unknown)?;
                continue;
            };
            if builder.skip_degenerate(corners.len(), Location::Unknown) {
                continue;
            }
            let result = builder.add_polygon(&corners).and_then(|face| {
                if self.textured {
                    builder.set_face_tex_coords(face, corners.clone())?;
                }
                Ok(())
            });
            if let Err(err) = result {
                log::trace!("ply face {row_index} rejected: {err}");
                builder.recover(Err(err), Location::Unknown)?;
            }
        }
        Ok(())
    }
}

impl Decoder for PlyDecoder {
    fn format(&self) -> FormatTag {
        FormatTag::Ply
    }

    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()> {
        *self = Self::new();
        let header = read_header(source)?;
        let offset = source.tell()?;
        let body = source.read_to_end()?;
        log::debug!(
            "ply body: {:?}, {} elements, {} bytes",
            header.encoding,
            header.elements.len(),
            body.len()
        );

        builder.begin_object("Object");
        match header.encoding {
            BodyEncoding::Ascii => {
                let text = String::from_utf8_lossy(&body);
                let mut values = AsciiValues {
                    tokens: text.split_whitespace(),
                    offset,
                };
                self.read_body(&header, &mut values, builder)
            }
            BodyEncoding::Binary(endian) => {
                let mut values = BinaryValues {
                    data: &body,
                    pos: 0,
                    endian,
                    offset,
                };
                self.read_body(&header, &mut values, builder)
            }
        }
    }
}
