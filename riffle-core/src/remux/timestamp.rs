//! 33-bit transport-clock timestamp handling.
//!
//! PTS/DTS values on the MPEG-2 transport clock wrap modulo 2^33. Large
//! jumps between consecutive timestamps are rollover, not motion; anchoring
//! every value to a rolling reference makes a sequence monotone on the
//! signed 64-bit domain used for all arithmetic in this crate.

/// One full wrap of the 33-bit PTS/DTS clock (2^33).
pub const PTS_WRAP: i64 = 8_589_934_592;

/// Half a wrap (2^32). Distances beyond this are treated as rollover.
pub const PTS_WRAP_PROBE: i64 = 4_294_967_296;

/// Shifts `value` by a signed multiple of 2^33 so that it lands within
/// 2^32 of `reference`. With no reference, `value` is returned unchanged.
pub fn normalize_pts(mut value: i64, reference: Option<i64>) -> i64 {
    let Some(reference) = reference else {
        return value;
    };
    // Each step closes the distance by a full wrap, so this terminates.
    let offset = if reference < value { -PTS_WRAP } else { PTS_WRAP };
    while (value - reference).abs() > PTS_WRAP_PROBE {
        value += offset;
    }
    value
}
