//! Small numeric helpers shared by scripts and subsystems.

/// Linear interpolation, unclamped.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Remap `v` from `[in_min, in_max]` to `[out_min, out_max]`, unclamped.
pub fn remap(v: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    let t = (v - in_min) / (in_max - in_min);
    out_min + (out_max - out_min) * t
}

/// Quantize `t` into `count` discrete steps.
pub fn step(t: f64, count: f64) -> f64 {
    (t * count).floor() / count
}

/// Degrees to radians.
pub fn deg_to_rad(deg: f64) -> f64 {
    deg * std::f64::consts::PI / 180.0
}

/// Radians to degrees.
pub fn rad_to_deg(rad: f64) -> f64 {
    rad * 180.0 / std::f64::consts::PI
}
