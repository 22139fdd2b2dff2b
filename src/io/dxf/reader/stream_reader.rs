//! DXF stream reader trait and common types

use crate::error::{Location, Result};
use crate::io::dxf::dxf_code;
use crate::types::Vector3;

/// A DXF code/value pair
#[derive(Debug, Clone, PartialEq)]
pub struct DxfCodePair {
    /// The DXF group code
    pub code: i32,

    /// String representation of the value
    pub value_string: String,

    /// Integer value (if the code is an integer code)
    pub value_int: Option<i64>,

    /// Floating-point value (if the code is a floating-point code)
    pub value_double: Option<f64>,

    /// Line of the value, for diagnostics
    pub line: usize,
}

impl DxfCodePair {
    /// Create a new code/value pair
    pub fn new(code: i32, value_string: String, line: usize) -> Self {
        let value_int = if dxf_code::is_integer(code) {
            value_string.trim().parse::<i64>().ok()
        } else {
            None
        };

        let value_double = if dxf_code::is_double(code) {
            value_string.trim().parse::<f64>().ok()
        } else {
            None
        };

        Self {
            code,
            value_string,
            value_int,
            value_double,
            line,
        }
    }

    /// `0/<name>` marker test, e.g. `is_marker("ENDSEC")`
    pub fn is_marker(&self, name: &str) -> bool {
        self.code == dxf_code::START && self.value_string == name
    }

    /// Get value as integer
    pub fn as_int(&self) -> Option<i64> {
        self.value_int
    }

    /// Get value as i16
    pub fn as_i16(&self) -> Option<i16> {
        self.value_int.and_then(|v| i16::try_from(v).ok())
    }

    /// Get value as double
    pub fn as_double(&self) -> Option<f64> {
        self.value_double
    }

    pub fn location(&self) -> Location {
        Location::Line(self.line)
    }
}

/// Trait for reading DXF code/value pairs from a stream
pub trait DxfStreamReader {
    /// Read the next code/value pair
    fn read_pair(&mut self) -> Result<Option<DxfCodePair>>;

    /// Push a pair back to be read again on next read_pair call
    fn push_back(&mut self, pair: DxfCodePair);

    /// Position of the most recently read line
    fn location(&self) -> Location;
}

/// Helper for reading 3D points from consecutive code pairs
#[derive(Debug, Clone, Default)]
pub struct PointReader {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    group: Option<usize>,
}

impl PointReader {
    /// Create a new point reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a coordinate value; `false` if the pair belongs to another point
    pub fn add_coordinate(&mut self, pair: &DxfCodePair) -> bool {
        let (Some(axis), Some(group)) = (
            dxf_code::coordinate_axis(pair.code),
            dxf_code::coordinate_group(pair.code),
        ) else {
            return false;
        };
        if self.group.is_some_and(|g| g != group) {
            return false;
        }
        self.group = Some(group);

        let Some(value) = pair.as_double() else {
            return false;
        };
        match axis {
            0 => self.x = Some(value),
            1 => self.y = Some(value),
            _ => self.z = Some(value),
        }
        true
    }

    /// Get the point (z defaults to 0 if not provided)
    pub fn get_point(&self) -> Option<Vector3> {
        match (self.x, self.y) {
            (Some(x), Some(y)) => Some(Vector3::new(x, y, self.z.unwrap_or(0.0))),
            _ => None,
        }
    }
}
