//! I/O module: byte sources, format tags, the dispatcher and one decoder
//! per supported file format

pub mod blend;
pub mod dxf;
pub mod format;
pub mod importer;
pub mod max3ds;
pub mod ply;
pub mod source;
pub mod stl;
pub mod text;

pub use text::{asc, cob, obj, plg};

pub use format::FormatTag;
pub use importer::{decode, decoder_for, Decoder, ImportConfiguration, SceneImporter};
pub use source::{ByteSource, Endian, StreamSource};
