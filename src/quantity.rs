//! Physical quantities of MoS2 films
//!
//! Derives the S/Mo atomic ratio and the number of MoS2 layers from the density and
//! Mo atomic percent channels of the spectrometer.

use crate::{coordinates::polar_to_cartesian, raw::RawMeasurement, slot::DerivedPoint};

/// Molar masses and calibration constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialConstants {
    /// Mo molar mass [g/mol]
    pub molar_mo: f64,
    /// S molar mass [g/mol]
    pub molar_s: f64,
    /// Mo atoms per monolayer-equivalent unit
    pub mo_unit: f64,
    /// Avogadro number [1/mol]
    pub avogadro: f64,
}
impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            molar_mo: 95.95,
            molar_s: 32.07,
            mo_unit: 11.6372403697997,
            avogadro: 6.022e23,
        }
    }
}

/// Converts raw readings into [DerivedPoint]s
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantityCalculator {
    constants: MaterialConstants,
}
impl QuantityCalculator {
    pub fn new(constants: MaterialConstants) -> Self {
        Self { constants }
    }
    pub fn constants(&self) -> &MaterialConstants {
        &self.constants
    }
    /// S atomic percent
    pub fn atomic_sulfur(&self, atomic_percent: f64) -> f64 {
        100f64 - atomic_percent
    }
    /// S/Mo atomic ratio, +∞ if the Mo channel is 0
    pub fn atomic_ratio(&self, atomic_percent: f64) -> f64 {
        self.atomic_sulfur(atomic_percent) / atomic_percent
    }
    /// Mo molar areal density
    pub fn molar_density(&self, density: f64, atomic_percent: f64) -> f64 {
        let MaterialConstants {
            molar_mo, molar_s, ..
        } = self.constants;
        density / (molar_mo + self.atomic_sulfur(atomic_percent) * molar_s / atomic_percent)
    }
    /// Number of MoS2 layers
    pub fn thickness(&self, density: f64, atomic_percent: f64) -> f64 {
        self.molar_density(density, atomic_percent) * 1e-20 * self.constants.avogadro
            / self.constants.mo_unit
    }
    /// Derives the wafer coordinates and the physical quantities of a reading,
    /// rounded to 2 decimals
    pub fn derive(&self, raw: &RawMeasurement) -> DerivedPoint {
        let (x, y) = polar_to_cartesian(raw.radius, raw.angle);
        DerivedPoint {
            x: round2(x),
            y: round2(y),
            density: round2(raw.density),
            s_mo: round2(self.atomic_ratio(raw.atomic_percent)),
            thickness: round2(self.thickness(raw.density, raw.atomic_percent)),
        }
    }
    /// Derives all the readings, preserving their order
    pub fn derive_all<'a>(
        &'a self,
        raws: impl IntoIterator<Item = &'a RawMeasurement> + 'a,
    ) -> impl Iterator<Item = DerivedPoint> + 'a {
        raws.into_iter().map(move |raw| self.derive(raw))
    }
}

/// Rounds to 2 decimals, ties to even
fn round2(value: f64) -> f64 {
    if value.is_finite() {
        (value * 100f64).round_ties_even() / 100f64
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(radius: f64, angle: f64, density: f64, atomic_percent: f64) -> RawMeasurement {
        RawMeasurement {
            radius,
            angle,
            density,
            atomic_percent,
        }
    }

    #[test]
    fn reference_point() {
        let calc = QuantityCalculator::default();
        let p = calc.derive(&raw(50., 90., 10., 80.));
        assert_eq!((p.x, p.y), (0., 5.));
        assert_eq!(p.s_mo, 0.25);
        assert_eq!(p.density, 10.);
        // 10 / (95.95 + 20 * 32.07 / 80) * 6022 / 11.637
        let expected: f64 = 10. / (95.95 + 20. * 32.07 / 80.) * 1e-20 * 6.022e23 / 11.6372403697997;
        assert_eq!(p.thickness, (expected * 100.).round_ties_even() / 100.);
    }

    #[test]
    fn rounding_ties_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(1.125), 1.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(-0.125), -0.12);
        assert!(round2(f64::INFINITY).is_infinite());
    }

    #[test]
    fn zero_mo_channel() {
        let calc = QuantityCalculator::default();
        let p = calc.derive(&raw(10., 0., 10., 0.));
        assert_eq!(p.s_mo, f64::INFINITY);
        assert_eq!(p.thickness, 0.);
        assert!(!p.is_defined());
    }

    #[test]
    fn order_invariance() {
        let calc = QuantityCalculator::new(MaterialConstants::default());
        let rows = vec![
            raw(50., 90., 10., 80.),
            raw(20., 180., 12.5, 75.),
            raw(35., 33., 8.1, 66.6),
        ];
        let forward: Vec<_> = calc.derive_all(&rows).collect();
        let mut backward: Vec<_> = calc.derive_all(rows.iter().rev()).collect();
        backward.reverse();
        assert_eq!(forward, backward);
    }
}
