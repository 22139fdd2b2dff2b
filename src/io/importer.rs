//! Format dispatcher: picks a decoder for a format tag and runs it

use crate::error::{ImportError, Result};
use crate::io::format::FormatTag;
use crate::io::source::{ByteSource, StreamSource};
use crate::io::{asc, blend, cob, dxf, max3ds, obj, plg, ply, stl};
use crate::scene::{DefaultSceneFactory, Scene, SceneBuilder, SceneFactory, TransformFlags};
use std::path::Path;

/// One implementation per on-disk format
pub trait Decoder {
    /// The format this decoder reads
    fn format(&self) -> FormatTag;

    /// Consume `source` from its start and populate `builder`
    fn decode(&mut self, source: &mut dyn ByteSource, builder: &mut SceneBuilder<'_>) -> Result<()>;
}

/// Configuration for an import.
#[derive(Debug, Clone, Default)]
pub struct ImportConfiguration {
    /// When `true`, unresolved material references are reported as
    /// notifications instead of aborting the import. Framing errors are
    /// always fatal.
    ///
    /// Default: `false` (strict mode; errors propagate).
    pub failsafe: bool,

    /// Axis swaps/inversions and winding inversion applied after decoding
    pub transform: TransformFlags,

    /// Fill in face normals computed from the winding
    pub compute_normals: bool,
}

impl ImportConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failsafe(mut self, failsafe: bool) -> Self {
        self.failsafe = failsafe;
        self
    }

    pub fn transform(mut self, flags: TransformFlags) -> Self {
        self.transform = flags;
        self
    }

    pub fn compute_normals(mut self, compute: bool) -> Self {
        self.compute_normals = compute;
        self
    }
}

/// Create the decoder registered for `format`
pub fn decoder_for(format: FormatTag) -> Result<Box<dyn Decoder>> {
    let decoder: Box<dyn Decoder> = match format {
        FormatTag::Max3ds => Box::new(max3ds::Max3dsDecoder::new()),
        FormatTag::Asc => Box::new(asc::AscDecoder::new()),
        FormatTag::Blend => Box::new(blend::BlendDecoder::new()),
        FormatTag::Cob => Box::new(cob::CobDecoder::new()),
        FormatTag::Dxf => Box::new(dxf::DxfDecoder::new()),
        FormatTag::Obj => Box::new(obj::ObjDecoder::new()),
        FormatTag::Plg => Box::new(plg::PlgDecoder::new()),
        FormatTag::Ply => Box::new(ply::PlyDecoder::new()),
        FormatTag::Stl => Box::new(stl::StlDecoder::new()),
        other => {
            return Err(ImportError::UnsupportedFormat(format!(
                "no decoder for .{other} files"
            )))
        }
    };
    Ok(decoder)
}

/// Imports scenes from byte sources.
///
/// ```rust,ignore
/// use scene_import::{FormatTag, SceneImporter, StreamSource};
///
/// let mut source = StreamSource::open("ship.3ds")?;
/// let scene = SceneImporter::new().decode(FormatTag::Max3ds, &mut source)?;
/// println!("{} objects", scene.objects.len());
/// # Ok::<(), scene_import::ImportError>(())
/// ```
pub struct SceneImporter<'f> {
    factory: &'f dyn SceneFactory,
    config: ImportConfiguration,
}

impl SceneImporter<'static> {
    /// Importer using [`DefaultSceneFactory`]
    pub fn new() -> Self {
        Self {
            factory: &DefaultSceneFactory,
            config: ImportConfiguration::default(),
        }
    }
}

impl Default for SceneImporter<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'f> SceneImporter<'f> {
    /// Importer constructing scenes through `factory`
    pub fn with_factory(factory: &'f dyn SceneFactory) -> Self {
        Self {
            factory,
            config: ImportConfiguration::default(),
        }
    }

    /// Set the importer configuration.
    pub fn with_configuration(mut self, config: ImportConfiguration) -> Self {
        self.config = config;
        self
    }

    pub fn configuration(&self) -> &ImportConfiguration {
        &self.config
    }

    /// Decode `source` as `format`.
    ///
    /// The scene is only returned when the decoder ran to completion and
    /// every reference in it resolves; on error the partial scene is dropped.
    pub fn decode(&self, format: FormatTag, source: &mut dyn ByteSource) -> Result<Scene> {
        let mut decoder = decoder_for(format)?;
        source.seek(0)?;

        let mut builder = SceneBuilder::new(self.factory).with_failsafe(self.config.failsafe);
        log::debug!("decoding {} source", decoder.format());
        decoder.decode(source, &mut builder)?;

        let mut scene = builder.finish()?;
        scene.apply_transform(self.config.transform);
        if self.config.compute_normals {
            scene.compute_face_normals();
        }
        log::debug!(
            "decoded {} objects, {} vertices, {} faces, {} notifications",
            scene.objects.len(),
            scene.vertex_count(),
            scene.face_count(),
            scene.notifications.len()
        );
        Ok(scene)
    }

    /// Open a file and decode it according to its suffix
    pub fn decode_file<P: AsRef<Path>>(&self, path: P) -> Result<Scene> {
        let path = path.as_ref();
        let format = FormatTag::from_path(path).ok_or_else(|| {
            ImportError::UnsupportedFormat(format!("unrecognized suffix: {}", path.display()))
        })?;
        let mut source = StreamSource::open(path)?;
        self.decode(format, &mut source)
    }
}

/// Decode with the default importer
pub fn decode(format: FormatTag, source: &mut dyn ByteSource) -> Result<Scene> {
    SceneImporter::new().decode(format, source)
}
