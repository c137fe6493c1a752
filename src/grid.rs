//! Wafer maps
//!
//! Interpolation of the scattered slot samples onto a uniform grid clipped by the wafer
//! edge exclusion.

mod field;
mod mask;
mod triangulation;

pub use field::InterpolatedField;
pub use mask::BoundaryMask;
use triangulation::Triangulation;

use crate::{settings::MapSettings, slot::SlotTable, Parameter};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("grid step must be strictly positive, found {0}")]
    Step(f64),
    #[error("mask size ({found}) does not match grid size ({expected})")]
    Shape { expected: usize, found: usize },
    #[error("failed to read or write {0:?}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to write the grid file")]
    Csv(#[from] csv::Error),
}
type Result<T> = std::result::Result<T, GridError>;

/// Distance between the wafer edge and the first grid node [cm]
pub const GRID_MARGIN: f64 = 0.5;

/// Square uniform grid centered on the wafer
///
/// Both axis span `[-radius+0.5, radius-0.5]` with the same step; nodes are stored
/// row-major with rows along Y and columns along X.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformGrid {
    radius: f64,
    step: f64,
    axis: Vec<f64>,
}
impl UniformGrid {
    pub fn new(radius: f64, step: f64) -> Result<Self> {
        if !(step > 0f64) || !step.is_finite() {
            return Err(GridError::Step(step));
        }
        let span = 2. * (radius - GRID_MARGIN);
        let n = if span >= 0. {
            (span / step).round() as usize + 1
        } else {
            0
        };
        let axis = (0..n)
            .map(|i| -radius + GRID_MARGIN + i as f64 * step)
            .collect();
        Ok(Self { radius, step, axis })
    }
    pub fn radius(&self) -> f64 {
        self.radius
    }
    pub fn step(&self) -> f64 {
        self.step
    }
    /// Grid coordinates along either axis
    pub fn axis(&self) -> &[f64] {
        &self.axis
    }
    /// Number of nodes along an axis
    pub fn size(&self) -> usize {
        self.axis.len()
    }
    /// Total number of nodes
    pub fn len(&self) -> usize {
        self.size() * self.size()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Iterator over the `(x,y)` coordinates of the nodes, row-major
    pub fn xy_iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.axis
            .iter()
            .flat_map(move |&y| self.axis.iter().map(move |&x| (x, y)))
    }
}

/// Linear interpolation of slot tables onto a [UniformGrid]
#[derive(Debug, Clone)]
pub struct GridInterpolator {
    grid: UniformGrid,
    mask: BoundaryMask,
    density_threshold: Option<f64>,
}
impl GridInterpolator {
    /// Creates an interpolator from a grid and its mask
    pub fn new(grid: UniformGrid, mask: BoundaryMask) -> Result<Self> {
        if mask.len() != grid.len() {
            return Err(GridError::Shape {
                expected: grid.len(),
                found: mask.len(),
            });
        }
        Ok(Self {
            grid,
            mask,
            density_threshold: None,
        })
    }
    /// Creates the interpolator from the wafer geometry of the settings
    pub fn from_settings(settings: &MapSettings) -> Result<Self> {
        let grid = UniformGrid::new(settings.radius(), settings.step)?;
        let mask = BoundaryMask::new(&grid, settings.radius(), settings.edge_exclusion);
        Ok(Self::new(grid, mask)?.density_threshold(settings.density_threshold()))
    }
    /// Masks densities below `threshold`
    pub fn density_threshold(self, threshold: Option<f64>) -> Self {
        Self {
            density_threshold: threshold,
            ..self
        }
    }
    pub fn grid(&self) -> &UniformGrid {
        &self.grid
    }
    pub fn mask(&self) -> &BoundaryMask {
        &self.mask
    }
    /// Interpolates a quantity of a slot table onto the grid
    ///
    /// Nodes outside the convex hull of the samples, outside the edge exclusion or,
    /// for the density, below the threshold are masked.
    /// Returns an empty field if the samples cannot be triangulated.
    pub fn interpolate(&self, table: &SlotTable, parameter: Parameter) -> InterpolatedField {
        let (nodes, values): (Vec<[f64; 2]>, Vec<f64>) = table
            .samples(parameter)
            .map(|(x, y, v)| ([x, y], v))
            .unzip();
        if nodes.len() < 2 {
            log::warn!("{}: {} valid sample(s), no map", parameter, nodes.len());
            return InterpolatedField::empty(parameter, &self.grid);
        }
        let Some(triangulation) = Triangulation::new(&nodes) else {
            log::warn!("{}: samples cannot be triangulated, no map", parameter);
            return InterpolatedField::empty(parameter, &self.grid);
        };
        let threshold = match parameter {
            Parameter::Density => self.density_threshold,
            _ => None,
        };
        let values = triangulation
            .rasterize(&values, &self.grid)
            .into_iter()
            .zip(self.mask.inside())
            .map(|(v, &inside)| {
                (inside && !v.is_nan() && threshold.map_or(true, |t| v >= t)).then_some(v)
            })
            .collect();
        InterpolatedField::new(parameter, &self.grid, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::DerivedPoint;

    fn plane_table(radius: f64) -> SlotTable {
        // a polar sampling of the plane density = 10 + x + 2y
        let mut points = vec![];
        for ring in 0..=4 {
            let r = radius * ring as f64 / 4.;
            let n = if ring == 0 { 1 } else { 8 * ring };
            for k in 0..n {
                let a = (k as f64 / n as f64) * std::f64::consts::TAU;
                let (x, y) = (r * a.cos(), r * a.sin());
                points.push(DerivedPoint {
                    x,
                    y,
                    density: 10. + x + 2. * y,
                    s_mo: 2.,
                    thickness: 1.,
                });
            }
        }
        points.into()
    }

    #[test]
    fn grid_extent() {
        let grid = UniformGrid::new(10., 0.5).unwrap();
        assert_eq!(grid.size(), 39);
        assert_eq!(grid.axis()[0], -9.5);
        assert_eq!(*grid.axis().last().unwrap(), 9.5);
        assert!(UniformGrid::new(10., 0.).is_err());
    }

    #[test]
    fn row_major_orientation() {
        let grid = UniformGrid::new(1.5, 0.5).unwrap();
        let xy: Vec<_> = grid.xy_iter().take(4).collect();
        assert_eq!(xy, vec![(-1., -1.), (-0.5, -1.), (0., -1.), (0.5, -1.)]);
    }

    #[test]
    fn linear_field_is_reproduced() {
        let grid = UniformGrid::new(10., 0.5).unwrap();
        let mask = BoundaryMask::new(&grid, 10., 2.5);
        let interpolator = GridInterpolator::new(grid, mask).unwrap();
        let field = interpolator.interpolate(&plane_table(9.), Parameter::Density);
        assert!(!field.is_empty());
        let mut n = 0;
        for ((x, y), v) in interpolator.grid().xy_iter().zip(field.values()) {
            if let Some(v) = v {
                assert!((v - (10. + x + 2. * y)).abs() < 1e-9);
                n += 1;
            }
        }
        assert!(n > 0);
    }

    #[test]
    fn nothing_outside_edge_exclusion() {
        let grid = UniformGrid::new(10., 0.5).unwrap();
        let mask = BoundaryMask::new(&grid, 10., 2.5);
        let interpolator = GridInterpolator::new(grid, mask).unwrap();
        let field = interpolator.interpolate(&plane_table(9.5), Parameter::Thickness);
        for ((x, y), v) in interpolator.grid().xy_iter().zip(field.values()) {
            if x * x + y * y >= 7.5 * 7.5 {
                assert!(v.is_none(), "({x},{y}) not masked");
            }
        }
        // (7.5, 0) sits exactly on the valid radius
        assert!(field.value_at(7.5, 0.).is_none());
        assert!((field.value_at(7., 0.).unwrap() - 1.).abs() < 1e-12);
    }

    #[test]
    fn density_threshold_only_masks_density() {
        let grid = UniformGrid::new(10., 0.5).unwrap();
        let mask = BoundaryMask::new(&grid, 10., 0.);
        let interpolator = GridInterpolator::new(grid, mask)
            .unwrap()
            .density_threshold(Some(9.5));
        let table = plane_table(9.);
        let density = interpolator.interpolate(&table, Parameter::Density);
        assert!(density.values().iter().flatten().all(|&v| v >= 9.5));
        assert!(density.value_at(0., 0.).is_some());
        assert!(density.value_at(-2., -2.).is_none());
        let ratio = interpolator.interpolate(&table, Parameter::AtomicRatio);
        assert!((ratio.value_at(-2., -2.).unwrap() - 2.).abs() < 1e-12);
    }

    #[test]
    fn too_few_samples() {
        let grid = UniformGrid::new(10., 0.5).unwrap();
        let mask = BoundaryMask::new(&grid, 10., 2.5);
        let interpolator = GridInterpolator::new(grid, mask).unwrap();
        let table: SlotTable = plane_table(9.).iter().take(1).cloned().collect();
        let field = interpolator.interpolate(&table, Parameter::Density);
        assert!(field.is_empty());
        let collinear: SlotTable = (0..5)
            .map(|i| DerivedPoint {
                x: i as f64,
                y: 0.,
                density: 1.,
                s_mo: 1.,
                thickness: 1.,
            })
            .collect();
        assert!(interpolator
            .interpolate(&collinear, Parameter::Density)
            .is_empty());
    }

    #[test]
    fn mask_shape_mismatch() {
        let grid = UniformGrid::new(10., 0.5).unwrap();
        let other = UniformGrid::new(5., 0.5).unwrap();
        let mask = BoundaryMask::new(&other, 5., 1.);
        assert!(matches!(
            GridInterpolator::new(grid, mask),
            Err(GridError::Shape { .. })
        ));
    }
}
