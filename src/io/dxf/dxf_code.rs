//! DXF group codes
//!
//! Only the codes the mesh decoder dispatches on are named here; every
//! other code is read as an opaque pair and ignored.

/// Entity type, section and table markers (`SECTION`, `3DFACE`, `EOF`)
pub const START: i32 = 0;
/// Primary text value (`$ACADVER` value)
pub const TEXT: i32 = 1;
/// Names: section, table and entry names
pub const NAME: i32 = 2;
pub const OTHER_NAME: i32 = 3;
pub const LAYER_NAME: i32 = 8;
/// Header variable name (`$ACADVER`)
pub const VARIABLE_NAME: i32 = 9;
/// Colour number (ACI); negative on a layer that is switched off
pub const COLOR: i32 = 62;
/// Integer flags
pub const FLAGS: i32 = 70;
/// Polyline mesh M count / polyface face record first index
pub const INT_1: i32 = 71;
pub const INT_2: i32 = 72;
pub const INT_3: i32 = 73;
pub const INT_4: i32 = 74;

/// First code of the coordinate range 10..=39
const COORDINATE_FIRST: i32 = 10;
const COORDINATE_LAST: i32 = 39;

/// Axis (0 = x, 1 = y, 2 = z) of a coordinate code
pub fn coordinate_axis(code: i32) -> Option<usize> {
    (COORDINATE_FIRST..=COORDINATE_LAST)
        .contains(&code)
        .then(|| (code / 10 - 1) as usize)
}

/// Point index (0 for 10/20/30, 1 for 11/21/31, ...) of a coordinate code
pub fn coordinate_group(code: i32) -> Option<usize> {
    (COORDINATE_FIRST..=COORDINATE_LAST)
        .contains(&code)
        .then(|| (code % 10) as usize)
}

/// Codes whose values are floating point
pub fn is_double(code: i32) -> bool {
    matches!(code, 10..=59 | 110..=149 | 210..=239 | 460..=469 | 1010..=1059)
}

/// Codes whose values are integers
pub fn is_integer(code: i32) -> bool {
    matches!(
        code,
        60..=99 | 160..=179 | 270..=299 | 370..=389 | 400..=409 | 420..=459 | 1060..=1071
    )
}
