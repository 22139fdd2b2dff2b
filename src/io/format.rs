//! Format tags and file suffix mapping

use ahash::AHashMap;
use once_cell::sync::Lazy;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported on-disk model formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// 3D Studio binary chunk file
    Max3ds,
    /// 3D Studio R4 world
    ThreeDrw,
    /// 3D Studio ASCII export
    Asc,
    /// Blender file
    Blend,
    /// trueSpace object
    Cob,
    /// AutoCAD drawing exchange
    Dxf,
    /// Wavefront object
    Obj,
    /// REND386 polygon file
    Plg,
    /// Stanford polygon file
    Ply,
    Scene,
    /// Stereolithography
    Stl,
    V3d,
    /// MagicaVoxel
    Vox,
    X3d,
}

static EXTENSIONS: Lazy<AHashMap<&'static str, FormatTag>> = Lazy::new(|| {
    FormatTag::ALL
        .iter()
        .map(|&tag| (tag.extension(), tag))
        .collect()
});

impl FormatTag {
    /// Every tag, in suffix order
    pub const ALL: [FormatTag; 14] = [
        FormatTag::Max3ds,
        FormatTag::ThreeDrw,
        FormatTag::Asc,
        FormatTag::Blend,
        FormatTag::Cob,
        FormatTag::Dxf,
        FormatTag::Obj,
        FormatTag::Plg,
        FormatTag::Ply,
        FormatTag::Scene,
        FormatTag::Stl,
        FormatTag::V3d,
        FormatTag::Vox,
        FormatTag::X3d,
    ];

    /// Lower-case file suffix without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            FormatTag::Max3ds => "3ds",
            FormatTag::ThreeDrw => "3drw",
            FormatTag::Asc => "asc",
            FormatTag::Blend => "blend",
            FormatTag::Cob => "cob",
            FormatTag::Dxf => "dxf",
            FormatTag::Obj => "obj",
            FormatTag::Plg => "plg",
            FormatTag::Ply => "ply",
            FormatTag::Scene => "scene",
            FormatTag::Stl => "stl",
            FormatTag::V3d => "v3d",
            FormatTag::Vox => "vox",
            FormatTag::X3d => "x3d",
        }
    }

    /// Case-insensitive lookup by suffix, with or without a leading dot
    pub fn from_extension(extension: &str) -> Option<FormatTag> {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        EXTENSIONS.get(ext.as_str()).copied()
    }

    /// Lookup by the trailing extension of a path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<FormatTag> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FormatTag::from_extension)
    }

    /// Whether this crate ships a decoder for the format
    pub fn has_decoder(&self) -> bool {
        matches!(
            self,
            FormatTag::Max3ds
                | FormatTag::Asc
                | FormatTag::Blend
                | FormatTag::Cob
                | FormatTag::Dxf
                | FormatTag::Obj
                | FormatTag::Plg
                | FormatTag::Ply
                | FormatTag::Stl
        )
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for FormatTag {
    type Err = crate::error::ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatTag::from_extension(s)
            .ok_or_else(|| crate::error::ImportError::UnsupportedFormat(s.to_string()))
    }
}
