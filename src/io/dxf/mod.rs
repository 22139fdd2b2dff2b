//! DXF (Drawing Exchange Format) reading
//!
//! Only the ASCII encoding is decoded. Surfaces come from `3DFACE`, `SOLID`,
//! `TRACE` and polyface/polygon-mesh `POLYLINE` entities.

pub mod dxf_code;
mod reader;

pub use reader::{DxfCodePair, DxfDecoder, DxfStreamReader, DxfTextReader};
