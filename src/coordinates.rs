//! Instrument to wafer coordinates
//!
//! The spectrometer stage reports each point as a radial distance [mm] and a polar
//! angle [degree]; maps are drawn in Cartesian wafer coordinates [cm].

/// Converts a polar stage reading into Cartesian wafer coordinates
///
/// `radius` is in millimeters and `angle` in degrees, the returned `(x,y)` are in
/// centimeters with the angle origin rotated by -90 degree.
/// NaN inputs propagate to the output.
pub fn polar_to_cartesian(radius: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = (angle - 90f64).to_radians().sin_cos();
    (radius * sin / 10f64, radius * cos / 10f64)
}
