//! Shared test utilities for scene-import integration tests.
//!
//! Synthetic file builders for the binary formats (3DS chunk trees, Blender
//! files with their structure DNA) plus small text fixtures, so no test
//! depends on sample files on disk.

#![allow(dead_code)]

use scene_import::{FormatTag, ImportConfiguration, Result, Scene, SceneImporter, StreamSource};

// ===========================================================================
// Decoding helpers
// ===========================================================================

/// Decode in-memory bytes as `format`
pub fn decode_bytes(format: FormatTag, bytes: Vec<u8>) -> Result<Scene> {
    let mut source = StreamSource::from_bytes(bytes);
    SceneImporter::new().decode(format, &mut source)
}

/// Decode in-memory bytes as `format` with failsafe enabled
pub fn decode_failsafe(format: FormatTag, bytes: Vec<u8>) -> Result<Scene> {
    let mut source = StreamSource::from_bytes(bytes);
    SceneImporter::new()
        .with_configuration(ImportConfiguration::new().failsafe(true))
        .decode(format, &mut source)
}

// ===========================================================================
// 3DS chunk writer
// ===========================================================================

pub mod chunk_id {
    pub const MAIN3DS: u16 = 0x4D4D;
    pub const M3D_VERSION: u16 = 0x0002;
    pub const COLOR_24: u16 = 0x0011;
    pub const EDIT3DS: u16 = 0x3D3D;
    pub const EDIT_MATERIAL: u16 = 0xAFFF;
    pub const MAT_NAME: u16 = 0xA000;
    pub const MAT_DIFFUSE: u16 = 0xA020;
    pub const EDIT_OBJECT: u16 = 0x4000;
    pub const OBJ_TRIMESH: u16 = 0x4100;
    pub const TRI_VERTEXL: u16 = 0x4110;
    pub const TRI_FACEL1: u16 = 0x4120;
    pub const TRI_MATERIAL: u16 = 0x4130;
    /// Not used by any 3DS version
    pub const UNKNOWN: u16 = 0x7A7A;
}

use chunk_id::*;

/// One chunk: id, total length, body
pub fn chunk(id: u16, body: &[u8]) -> Vec<u8> {
    let mut out = id.to_le_bytes().to_vec();
    out.extend_from_slice(&((body.len() + 6) as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// NUL terminated string
pub fn cstr(s: &str) -> Vec<u8> {
    let mut out = s.as_bytes().to_vec();
    out.push(0);
    out
}

/// A named trimesh object; faces are corner triples, all edges visible
pub fn mesh_object(
    name: &str,
    vertices: &[[f32; 3]],
    faces: &[[u16; 3]],
    material: Option<&str>,
) -> Vec<u8> {
    let mut verts = (vertices.len() as u16).to_le_bytes().to_vec();
    for v in vertices {
        for c in v {
            verts.extend_from_slice(&c.to_le_bytes());
        }
    }

    let mut face_list = (faces.len() as u16).to_le_bytes().to_vec();
    for f in faces {
        for i in f {
            face_list.extend_from_slice(&i.to_le_bytes());
        }
        face_list.extend_from_slice(&7u16.to_le_bytes());
    }
    if let Some(name) = material {
        let mut group = cstr(name);
        group.extend_from_slice(&(faces.len() as u16).to_le_bytes());
        for i in 0..faces.len() as u16 {
            group.extend_from_slice(&i.to_le_bytes());
        }
        face_list.extend(chunk(TRI_MATERIAL, &group));
    }

    let mut mesh = chunk(TRI_VERTEXL, &verts);
    mesh.extend(chunk(TRI_FACEL1, &face_list));
    let mut body = cstr(name);
    body.extend(chunk(OBJ_TRIMESH, &mesh));
    chunk(EDIT_OBJECT, &body)
}

/// A material with a 24-bit diffuse colour
pub fn material_chunk(name: &str, rgb: [u8; 3]) -> Vec<u8> {
    let mut body = chunk(MAT_NAME, &cstr(name));
    body.extend(chunk(MAT_DIFFUSE, &chunk(COLOR_24, &rgb)));
    chunk(EDIT_MATERIAL, &body)
}

/// Wrap editor children into a complete file
pub fn file_3ds(editor: &[u8]) -> Vec<u8> {
    let mut main = chunk(M3D_VERSION, &3u32.to_le_bytes());
    main.extend(chunk(EDIT3DS, editor));
    chunk(MAIN3DS, &main)
}

pub const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

/// One triangle object bound to one red material
pub fn minimal_3ds() -> Vec<u8> {
    let mut editor = material_chunk("RED", [255, 0, 0]);
    editor.extend(mesh_object("Tri", &TRIANGLE, &[[0, 1, 2]], Some("RED")));
    file_3ds(&editor)
}

// ===========================================================================
// Blender file writer
// ===========================================================================

/// Pointer size and byte order a blend file is written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendLayout {
    pub pointer_size: usize,
    pub big_endian: bool,
}

impl BlendLayout {
    /// `BLENDER-v`: 8 byte pointers, little endian
    pub const LE64: Self = Self {
        pointer_size: 8,
        big_endian: false,
    };
    /// `BLENDER_V`: 4 byte pointers, big endian
    pub const BE32: Self = Self {
        pointer_size: 4,
        big_endian: true,
    };

    fn magic(self) -> Vec<u8> {
        let size = if self.pointer_size == 4 { b'_' } else { b'-' };
        let order = if self.big_endian { b'V' } else { b'v' };
        let mut out = b"BLENDER".to_vec();
        out.extend_from_slice(&[size, order]);
        out.extend_from_slice(b"279");
        out
    }

    fn order<const N: usize>(self, mut le: [u8; N]) -> [u8; N] {
        if self.big_endian {
            le.reverse();
        }
        le
    }

    pub fn u16(self, v: u16) -> [u8; 2] {
        self.order(v.to_le_bytes())
    }

    pub fn i16(self, v: i16) -> [u8; 2] {
        self.order(v.to_le_bytes())
    }

    pub fn u32(self, v: u32) -> [u8; 4] {
        self.order(v.to_le_bytes())
    }

    pub fn i32(self, v: i32) -> [u8; 4] {
        self.order(v.to_le_bytes())
    }

    pub fn f32(self, v: f32) -> [u8; 4] {
        self.order(v.to_le_bytes())
    }

    pub fn pointer(self, address: u64) -> Vec<u8> {
        if self.pointer_size == 4 {
            self.u32(address as u32).to_vec()
        } else {
            self.order(address.to_le_bytes()).to_vec()
        }
    }
}

/// Structure DNA payload of a little endian `DNA1` block
pub fn sdna(names: &[&str], types: &[(&str, u16)], structs: &[(u16, &[(u16, u16)])]) -> Vec<u8> {
    sdna_in(BlendLayout::LE64, names, types, structs)
}

/// Structure DNA payload in the byte order of `layout`
pub fn sdna_in(
    layout: BlendLayout,
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
    out.extend_from_slice(&layout.u32(names.len() as u32));
    for name in names {
        out.extend(cstr(name));
    }
    pad(&mut out);
    out.extend_from_slice(b"TYPE");
    out.extend_from_slice(&layout.u32(types.len() as u32));
    for (name, _) in types {
        out.extend(cstr(name));
    }
    pad(&mut out);
    out.extend_from_slice(b"TLEN");
    for (_, len) in types {
        out.extend_from_slice(&layout.u16(*len));
    }
    pad(&mut out);
    out.extend_from_slice(b"STRC");
    out.extend_from_slice(&layout.u32(structs.len() as u32));
    for (ty, fields) in structs {
        out.extend_from_slice(&layout.u16(*ty));
        out.extend_from_slice(&layout.u16(fields.len() as u16));
        for (field_type, name) in *fields {
            out.extend_from_slice(&layout.u16(*field_type));
            out.extend_from_slice(&layout.u16(*name));
        }
    }
    out
}

/// Block-by-block blend file writer
pub struct BlendWriter {
    layout: BlendLayout,
    data: Vec<u8>,
}

impl BlendWriter {
    /// A `BLENDER-v279` file
    pub fn new() -> Self {
        Self::with_layout(BlendLayout::LE64)
    }

    pub fn with_layout(layout: BlendLayout) -> Self {
        Self {
            layout,
            data: layout.magic(),
        }
    }

    pub fn block(mut self, code: &[u8; 4], address: u64, sdna_index: u32, count: u32, payload: &[u8]) -> Self {
        let layout = self.layout;
        self.data.extend_from_slice(code);
        self.data.extend_from_slice(&layout.i32(payload.len() as i32));
        self.data.extend(layout.pointer(address));
        self.data.extend_from_slice(&layout.u32(sdna_index));
        self.data.extend_from_slice(&layout.u32(count));
        self.data.extend_from_slice(payload);
        self
    }

    /// Append the `ENDB` terminator
    pub fn finish(self) -> Vec<u8> {
        self.block(b"ENDB", 0, 0, 0, &[]).data
    }

    /// Bytes written so far, without a terminator
    pub fn unterminated(self) -> Vec<u8> {
        self.data
    }
}

/// Struct indices in [`mesh_schema`] and [`poly_schema`]
pub mod blend_struct {
    pub const OBJECT: u32 = 1;
    pub const MESH: u32 = 2;
    pub const MVERT: u32 = 3;
    pub const MFACE: u32 = 4;
    pub const MPOLY: u32 = 4;
    pub const MLOOP: u32 = 5;
}

/// Schema with `ID`, `Object`, `Mesh`, `MVert` and legacy `MFace`
pub fn mesh_schema(layout: BlendLayout) -> Vec<u8> {
    let ptr = layout.pointer_size as u16;
    sdna_in(
        layout,
        &[
            "name[24]", "*data", "type", "id", "*mvert", "*mface", "totvert", "co[3]", "v1", "v2",
            "v3", "v4", "mat_nr", "pad",
        ],
        &[
            ("char", 1),
            ("short", 2),
            ("int", 4),
            ("float", 4),
            ("ID", 24),
            ("Object", 28 + ptr),
            ("Mesh", 28 + 2 * ptr),
            ("MVert", 12),
            ("MFace", 20),
        ],
        &[
            (4, &[(0, 0)]),
            (5, &[(4, 3), (0, 1), (1, 2), (1, 13)]),
            (6, &[(4, 3), (7, 4), (8, 5), (2, 6)]),
            (7, &[(3, 7)]),
            (8, &[(2, 8), (2, 9), (2, 10), (2, 11), (1, 12), (1, 13)]),
        ],
    )
}

/// Schema whose `Mesh` stores faces as `MPoly` loop ranges over `MLoop`
pub fn poly_schema(layout: BlendLayout) -> Vec<u8> {
    let ptr = layout.pointer_size as u16;
    sdna_in(
        layout,
        &[
            "name[24]", "*data", "type", "id", "*mvert", "*mpoly", "*mloop", "totvert", "co[3]",
            "loopstart", "totloop", "mat_nr", "pad", "v", "e",
        ],
        &[
            ("char", 1),
            ("short", 2),
            ("int", 4),
            ("float", 4),
            ("ID", 24),
            ("Object", 28 + ptr),
            ("Mesh", 28 + 3 * ptr),
            ("MVert", 12),
            ("MPoly", 12),
            ("MLoop", 8),
        ],
        &[
            (4, &[(0, 0)]),
            (5, &[(4, 3), (0, 1), (1, 2), (1, 12)]),
            (6, &[(4, 3), (7, 4), (8, 5), (9, 6), (2, 7)]),
            (7, &[(3, 8)]),
            (8, &[(2, 9), (2, 10), (1, 11), (1, 12)]),
            (9, &[(2, 13), (2, 14)]),
        ],
    )
}

fn id(name: &str) -> Vec<u8> {
    let mut out = name.as_bytes().to_vec();
    out.resize(24, 0);
    out
}

const OBJECT_ADDRESS: u64 = 0x100;
const MESH_ADDRESS: u64 = 0x1000;
const MVERT_ADDRESS: u64 = 0x2000;
const MFACE_ADDRESS: u64 = 0x3000;
const MLOOP_ADDRESS: u64 = 0x4000;

fn cube_object(layout: BlendLayout) -> Vec<u8> {
    let mut object = id("OBCube");
    object.extend(layout.pointer(MESH_ADDRESS));
    object.extend_from_slice(&layout.i16(1));
    object.extend_from_slice(&layout.i16(0));
    object
}

fn triangle_vertices(layout: BlendLayout) -> Vec<u8> {
    let mut verts = Vec::new();
    for v in TRIANGLE {
        for c in v {
            verts.extend_from_slice(&layout.f32(c));
        }
    }
    verts
}

/// An object `Cube` whose mesh holds one triangle, little endian
pub fn minimal_blend() -> BlendWriter {
    minimal_blend_in(BlendLayout::LE64)
}

/// [`minimal_blend`] written with the given pointer size and byte order
pub fn minimal_blend_in(layout: BlendLayout) -> BlendWriter {
    let mut mesh = id("MECube");
    mesh.extend(layout.pointer(MVERT_ADDRESS));
    mesh.extend(layout.pointer(MFACE_ADDRESS));
    mesh.extend_from_slice(&layout.i32(3));

    let mut face = Vec::new();
    for v in [0i32, 1, 2, 0] {
        face.extend_from_slice(&layout.i32(v));
    }
    face.extend_from_slice(&[0; 4]);

    BlendWriter::with_layout(layout)
        .block(b"OB\0\0", OBJECT_ADDRESS, blend_struct::OBJECT, 1, &cube_object(layout))
        .block(b"ME\0\0", MESH_ADDRESS, blend_struct::MESH, 1, &mesh)
        .block(b"DATA", MVERT_ADDRESS, blend_struct::MVERT, 3, &triangle_vertices(layout))
        .block(b"DATA", MFACE_ADDRESS, blend_struct::MFACE, 1, &face)
        .block(b"DNA1", 0, 0, 1, &mesh_schema(layout))
}

/// An object `Cube` whose mesh has the polygons given as loop vertex lists
pub fn poly_blend(polygons: &[&[i32]]) -> BlendWriter {
    let layout = BlendLayout::LE64;
    let mut mesh = id("MECube");
    mesh.extend(layout.pointer(MVERT_ADDRESS));
    mesh.extend(layout.pointer(MFACE_ADDRESS));
    mesh.extend(layout.pointer(MLOOP_ADDRESS));
    mesh.extend_from_slice(&layout.i32(3));

    let mut polys = Vec::new();
    let mut loops = Vec::new();
    let mut start = 0;
    for polygon in polygons {
        polys.extend_from_slice(&layout.i32(start));
        polys.extend_from_slice(&layout.i32(polygon.len() as i32));
        polys.extend_from_slice(&[0; 4]);
        for &v in *polygon {
            loops.extend_from_slice(&layout.i32(v));
            loops.extend_from_slice(&layout.i32(0));
        }
        start += polygon.len() as i32;
    }

    BlendWriter::with_layout(layout)
        .block(b"OB\0\0", OBJECT_ADDRESS, blend_struct::OBJECT, 1, &cube_object(layout))
        .block(b"ME\0\0", MESH_ADDRESS, blend_struct::MESH, 1, &mesh)
        .block(b"DATA", MVERT_ADDRESS, blend_struct::MVERT, 3, &triangle_vertices(layout))
        .block(b"DATA", MFACE_ADDRESS, blend_struct::MPOLY, polygons.len() as u32, &polys)
        .block(b"DATA", MLOOP_ADDRESS, blend_struct::MLOOP, start as u32, &loops)
        .block(b"DNA1", 0, 0, 1, &poly_schema(layout))
}

// ===========================================================================
// Text fixtures
// ===========================================================================

/// Two PLG objects: a quad and a triangle
pub const PLG_TWO_OBJECTS: &str = "\
quad 4 1
0 0 0
1 0 0
1 1 0
0 1 0
0x11FF 4 0 1 2 3
tri 3 1
0 0 1
1 0 1
0 1 1
0x8080 3 0 1 2
";

/// A textured OBJ quad split into two groups
pub const OBJ_QUAD: &str = "\
o quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl red
f 1/1 2/2 3/3 4/4
";

/// Insert a comment line after every line whose index is in `after`
pub fn with_comments(text: &str, after: &[usize], prefix: &str) -> String {
    let mut out = String::new();
    for (index, line) in text.lines().enumerate() {
        out.push_str(line);
        out.push('\n');
        if after.contains(&index) {
            out.push_str(prefix);
            out.push_str(" comment\n");
        }
    }
    out
}
