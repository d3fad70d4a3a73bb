//! Octahedral unit-vector decoding.

use glam::DVec3;

/// Largest encoded component value.
const RANGE_MAX: f64 = 255.0;

/// Decode a unit vector from two octahedral-encoded bytes.
///
/// Each byte maps linearly from `[0, 255]` to `[-1, 1]`. The third component
/// is `1 - |x| - |y|`; when that is negative the point lies on the lower
/// half of the octahedron and `x`, `y` are folded back before normalizing.
#[must_use]
pub fn oct_decode(x: u8, y: u8) -> DVec3 {
    let mut v = DVec3::new(from_snorm(x), from_snorm(y), 0.0);
    v.z = 1.0 - (v.x.abs() + v.y.abs());

    if v.z < 0.0 {
        let old_x = v.x;
        v.x = (1.0 - v.y.abs()) * sign_not_zero(old_x);
        v.y = (1.0 - old_x.abs()) * sign_not_zero(v.y);
    }

    v.normalize()
}

fn from_snorm(value: u8) -> f64 {
    f64::from(value) / RANGE_MAX * 2.0 - 1.0
}

fn sign_not_zero(value: f64) -> f64 {
    if value < 0.0 { -1.0 } else { 1.0 }
}
