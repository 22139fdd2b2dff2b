//! DXF section readers
//!
//! Every mesh-like entity becomes faces on the object of its layer; layer
//! colours from the LAYER table become one material per layer.

use super::stream_reader::{DxfCodePair, DxfStreamReader, PointReader};
use crate::error::{ImportError, Location, Result};
use crate::io::dxf::dxf_code;
use crate::notification::NotificationType;
use crate::scene::{Face, FaceFlags, Material, MaterialId, ObjectId, SceneBuilder};
use crate::types::{Color, Vector3};
use ahash::AHashMap;
use indexmap::IndexMap;

/// POLYLINE flag: closed in the M direction
const POLYLINE_CLOSED: i16 = 1;
/// POLYLINE flag: polygon mesh
const POLYLINE_POLYGON_MESH: i16 = 16;
/// POLYLINE flag: closed in the N direction
const POLYLINE_CLOSED_N: i16 = 32;
/// POLYLINE flag: polyface mesh
const POLYLINE_POLYFACE: i16 = 64;
/// VERTEX flag: polyface mesh vertex (position when combined with 64)
const VERTEX_POLYFACE: i16 = 128;
const VERTEX_MESH: i16 = 64;

/// Layer materials and the object collecting each layer's faces
#[derive(Debug, Default)]
pub struct LayerTable {
    materials: AHashMap<String, MaterialId>,
    objects: IndexMap<String, ObjectId>,
    skipped: IndexMap<String, usize>,
}

impl LayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn material(&self, layer: &str) -> Option<MaterialId> {
        self.materials.get(layer).copied()
    }
}

/// Geometry of one entity in entity-local vertex indices
#[derive(Debug, Clone, Default)]
struct EntityMesh {
    layer: String,
    vertices: Vec<Vector3>,
    faces: Vec<Face>,
}

/// One polyline VERTEX record
#[derive(Debug, Clone, Default)]
struct PolylineVertex {
    point: Option<Vector3>,
    flags: i16,
    indices: [i64; 4],
}

/// Section reader for parsing DXF sections
pub struct SectionReader<'a, 'f> {
    reader: &'a mut dyn DxfStreamReader,
    builder: &'a mut SceneBuilder<'f>,
    layers: &'a mut LayerTable,
}

impl<'a, 'f> SectionReader<'a, 'f> {
    /// Create a new section reader
    pub fn new(
        reader: &'a mut dyn DxfStreamReader,
        builder: &'a mut SceneBuilder<'f>,
        layers: &'a mut LayerTable,
    ) -> Self {
        Self {
            reader,
            builder,
            layers,
        }
    }

    /// Next pair inside a section; end of input there is truncation
    fn next_in_section(&mut self) -> Result<DxfCodePair> {
        self.reader.read_pair()?.ok_or_else(|| {
            ImportError::truncated(self.reader.location(), "section without ENDSEC")
        })
    }

    /// Read the HEADER section
    pub fn read_header(&mut self) -> Result<()> {
        loop {
            let pair = self.next_in_section()?;
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
            if pair.code == dxf_code::VARIABLE_NAME && pair.value_string == "$ACADVER" {
                let version = self.next_in_section()?;
                log::debug!("dxf version {}", version.value_string);
            }
        }
    }

    /// Read the TABLES section
    pub fn read_tables(&mut self) -> Result<()> {
        loop {
            let pair = self.next_in_section()?;
            if pair.is_marker("ENDSEC") {
                return Ok(());
            }
            if pair.is_marker("TABLE") {
                let name = self.next_in_section()?;
                match (name.code, name.value_string.as_str()) {
                    (dxf_code::NAME, "LAYER") => self.read_layer_table()?,
                    _ => self.skip_to_endtab()?,
                }
            }
        }
    }

    fn skip_to_endtab(&mut self) -> Result<()> {
        loop {
            if self.next_in_section()?.is_marker("ENDTAB") {
                return Ok(());
            }
        }
    }

    fn read_layer_table(&mut self) -> Result<()> {
        loop {
            let pair = self.next_in_section()?;
            if pair.is_marker("ENDTAB") {
                return Ok(());
            }
            if pair.is_marker("LAYER") {
                self.read_layer_entry()?;
            }
        }
    }

    /// Read a single LAYER entry
    fn read_layer_entry(&mut self) -> Result<()> {
        let mut name = String::from("0");
        let mut color = 7i16;

        loop {
            let pair = self.next_in_section()?;
            if pair.code == dxf_code::START {
                self.reader.push_back(pair);
                break;
            }
            match pair.code {
                dxf_code::NAME => name = pair.value_string.clone(),
                dxf_code::COLOR => color = pair.as_i16().unwrap_or(color),
                _ => {}
            }
        }

        let id = self
            .builder
            .add_material_def(Material::with_color(name.as_str(), Color::from_aci(color)));
        self.layers.materials.insert(name, id);
        Ok(())
    }

    /// Skip the current section
    pub fn skip_section(&mut self) -> Result<()> {
        loop {
            if self.next_in_section()?.is_marker("ENDSEC") {
                return Ok(());
            }
        }
    }

    /// Read the ENTITIES section
    pub fn read_entities(&mut self) -> Result<()> {
        loop {
            let pair = self.next_in_section()?;
            if pair.is_marker("ENDSEC") {
                break;
            }
            if pair.code != dxf_code::START {
                continue;
            }

            let location = pair.location();
            let mesh = match pair.value_string.as_str() {
                "3DFACE" => Some(self.read_face3d()?),
                "SOLID" | "TRACE" => Some(self.read_solid()?),
                "POLYLINE" => self.read_polyline(location)?,
                other => {
                    *self.layers.skipped.entry(other.to_string()).or_default() += 1;
                    self.skip_entity()?;
                    None
                }
            };
            if let Some(mesh) = mesh {
                self.emit(mesh, location)?;
            }
        }

        for (name, count) in std::mem::take(&mut self.layers.skipped) {
            self.builder.notify(
                NotificationType::Skipped,
                Location::Unknown,
                format!("{count} {name} entities"),
            );
        }
        Ok(())
    }

    /// Consume the pairs of an entity, leaving the next `0` pair unread
    fn skip_entity(&mut self) -> Result<()> {
        loop {
            let pair = self.next_in_section()?;
            if pair.code == dxf_code::START {
                self.reader.push_back(pair);
                return Ok(());
            }
        }
    }

    /// Read pairs up to the next `0` pair, feeding each to `handle`
    fn read_fields(&mut self, mut handle: impl FnMut(&DxfCodePair)) -> Result<()> {
        loop {
            let pair = self.next_in_section()?;
            if pair.code == dxf_code::START {
                self.reader.push_back(pair);
                return Ok(());
            }
            handle(&pair);
        }
    }

    /// Four corner points and the common fields of 3DFACE/SOLID/TRACE
    fn read_corners(&mut self) -> Result<(String, [Option<Vector3>; 4], i16)> {
        let mut layer = String::from("0");
        let mut corners: [PointReader; 4] = Default::default();
        let mut flags = 0i16;

        self.read_fields(|pair| match pair.code {
            dxf_code::LAYER_NAME => layer = pair.value_string.clone(),
            dxf_code::FLAGS => flags = pair.as_i16().unwrap_or(0),
            code => {
                if let Some(group) = dxf_code::coordinate_group(code).filter(|&g| g < 4) {
                    corners[group].add_coordinate(pair);
                }
            }
        })?;

        Ok((layer, corners.map(|c| c.get_point()), flags))
    }

    /// Read a 3DFACE entity; a repeated last corner makes it a triangle
    fn read_face3d(&mut self) -> Result<EntityMesh> {
        let (layer, corners, invisible) = self.read_corners()?;
        let [a, b, c, d] = corners.map(|p| p.unwrap_or(Vector3::ZERO));
        let d = corners[3].map(|_| d).unwrap_or(c);

        let mut vertices = vec![a, b, c];
        let closing_bit = if d != c {
            vertices.push(d);
            8
        } else {
            4
        };
        let mut face = Face::new((0..vertices.len()).collect());
        face.flags = edge_flags(invisible & 1 != 0, invisible & 2 != 0, invisible & closing_bit != 0);

        Ok(EntityMesh {
            layer,
            vertices,
            faces: vec![face],
        })
    }

    /// Read a SOLID or TRACE entity; corners are stored in zigzag order
    fn read_solid(&mut self) -> Result<EntityMesh> {
        let (layer, corners, _) = self.read_corners()?;
        let [a, b, c, d] = corners.map(|p| p.unwrap_or(Vector3::ZERO));
        let d = corners[3].map(|_| d).unwrap_or(c);

        let vertices = if d != c { vec![a, b, d, c] } else { vec![a, b, c] };
        let face = Face::new((0..vertices.len()).collect());
        Ok(EntityMesh {
            layer,
            vertices,
            faces: vec![face],
        })
    }

    fn read_vertex(&mut self) -> Result<PolylineVertex> {
        let mut vertex = PolylineVertex::default();
        let mut point = PointReader::new();
        self.read_fields(|pair| match pair.code {
            dxf_code::FLAGS => vertex.flags = pair.as_i16().unwrap_or(0),
            dxf_code::INT_1..=dxf_code::INT_4 => {
                vertex.indices[(pair.code - dxf_code::INT_1) as usize] = pair.as_int().unwrap_or(0)
            }
            _ => {
                point.add_coordinate(pair);
            }
        })?;
        vertex.point = point.get_point();
        Ok(vertex)
    }

    /// Read a POLYLINE with its VERTEX records up to SEQEND.
    ///
    /// Polyface and polygon meshes become faces; plain 2D/3D polylines have
    /// no surface and are skipped.
    fn read_polyline(&mut self, location: Location) -> Result<Option<EntityMesh>> {
        let mut layer = String::from("0");
        let mut flags = 0i16;
        let mut m = 0usize;
        let mut n = 0usize;
        self.read_fields(|pair| match pair.code {
            dxf_code::LAYER_NAME => layer = pair.value_string.clone(),
            dxf_code::FLAGS => flags = pair.as_i16().unwrap_or(0),
            dxf_code::INT_1 => m = pair.as_int().unwrap_or(0).max(0) as usize,
            dxf_code::INT_2 => n = pair.as_int().unwrap_or(0).max(0) as usize,
            _ => {}
        })?;

        let mut vertices = Vec::new();
        loop {
            let pair = self.next_in_section()?;
            if pair.is_marker("VERTEX") {
                vertices.push(self.read_vertex()?);
            } else if pair.is_marker("SEQEND") {
                self.skip_entity()?;
                break;
            } else {
                // sequence cut short by the next entity
                self.reader.push_back(pair);
                break;
            }
        }

        if flags & POLYLINE_POLYFACE != 0 {
            self.polyface(layer, &vertices, location).map(Some)
        } else if flags & POLYLINE_POLYGON_MESH != 0 {
            let closed = (flags & POLYLINE_CLOSED != 0, flags & POLYLINE_CLOSED_N != 0);
            polygon_mesh(layer, &vertices, m, n, closed, location).map(Some)
        } else {
            *self.layers.skipped.entry("POLYLINE (wire)".to_string()).or_default() += 1;
            Ok(None)
        }
    }

    fn polyface(
        &mut self,
        layer: String,
        records: &[PolylineVertex],
        location: Location,
    ) -> Result<EntityMesh> {
        let mut mesh = EntityMesh {
            layer,
            ..Default::default()
        };
        let mut face_records = Vec::new();
        for record in records {
            let is_face = record.flags & VERTEX_POLYFACE != 0 && record.flags & VERTEX_MESH == 0;
            if is_face {
                face_records.push(record);
            } else {
                mesh.vertices.push(record.point.unwrap_or(Vector3::ZERO));
            }
        }

        for record in face_records {
            let corners: Vec<i64> = record.indices.iter().copied().filter(|&i| i != 0).collect();
            if corners.len() < 3 {
                continue;
            }
            if let Some(bad) = corners.iter().find(|i| i.unsigned_abs() as usize > mesh.vertices.len()) {
                let err = ImportError::unresolved(
                    location,
                    format!("polyface vertex {bad} of {}", mesh.vertices.len()),
                );
                self.builder.recover(Err(err), location)?;
                continue;
            }
            // a negative index hides the edge starting at that corner
            let last = corners.len() - 1;
            let mut face =
                Face::new(corners.iter().map(|i| i.unsigned_abs() as usize - 1).collect());
            face.flags = edge_flags(corners[0] < 0, corners[1] < 0, corners[last] < 0);
            mesh.faces.push(face);
        }
        Ok(mesh)
    }

    /// Add an entity's geometry to the object of its layer
    fn emit(&mut self, mesh: EntityMesh, location: Location) -> Result<()> {
        match self.layers.objects.get(&mesh.layer) {
            Some(&id) => self.builder.select_object(id)?,
            None => {
                let id = self.builder.begin_object(&mesh.layer);
                self.layers.objects.insert(mesh.layer.clone(), id);
            }
        }

        let base = self.builder.vertex_count();
        for v in &mesh.vertices {
            self.builder.add_vertex(v.x, v.y, v.z);
        }
        let material = self.layers.material(&mesh.layer);
        for mut face in mesh.faces {
            face.indices.iter_mut().for_each(|i| *i += base);
            face.material = material;
            if let Err(err) = self.builder.add_face(face) {
                self.builder.recover(Err(err), location)?;
            }
        }
        Ok(())
    }
}

/// Face flags from per-edge invisibility
fn edge_flags(ab_hidden: bool, bc_hidden: bool, closing_hidden: bool) -> FaceFlags {
    let mut flags = FaceFlags::default();
    flags.set(FaceFlags::EDGE_AB_VISIBLE, !ab_hidden);
    flags.set(FaceFlags::EDGE_BC_VISIBLE, !bc_hidden);
    flags.set(FaceFlags::EDGE_CA_VISIBLE, !closing_hidden);
    flags
}

/// Quads of an M x N vertex grid, wrapping where the mesh is closed
fn polygon_mesh(
    layer: String,
    records: &[PolylineVertex],
    m: usize,
    n: usize,
    (closed_m, closed_n): (bool, bool),
    location: Location,
) -> Result<EntityMesh> {
    if m < 2 || n < 2 || records.len() < m * n {
        return Err(ImportError::malformed(
            location,
            format!("polygon mesh declares {m}x{n} vertices, {} present", records.len()),
        ));
    }
    let vertices = records[..m * n]
        .iter()
        .map(|r| r.point.unwrap_or(Vector3::ZERO))
        .collect();

    let rows = if closed_m { m } else { m - 1 };
    let columns = if closed_n { n } else { n - 1 };
    let mut faces = Vec::with_capacity(rows * columns);
    for i in 0..rows {
        let next_i = (i + 1) % m;
        for j in 0..columns {
            let next_j = (j + 1) % n;
            faces.push(Face::new(vec![
                i * n + j,
                i * n + next_j,
                next_i * n + next_j,
                next_i * n + j,
            ]));
        }
    }
    Ok(EntityMesh {
        layer,
        vertices,
        faces,
    })
}
