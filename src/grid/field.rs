//! Interpolated maps

use super::{BoundaryMask, GridError, Result, UniformGrid};
use crate::Parameter;
use std::path::Path;

/// A quantity interpolated on a [UniformGrid]
///
/// Values are stored row-major (rows along Y), `None` marking a masked node.
/// A field without values is a placeholder for a slot that could not be mapped.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedField {
    parameter: Parameter,
    axis: Vec<f64>,
    step: f64,
    values: Vec<Option<f64>>,
}
impl InterpolatedField {
    pub(super) fn new(parameter: Parameter, grid: &UniformGrid, values: Vec<Option<f64>>) -> Self {
        Self {
            parameter,
            axis: grid.axis().to_vec(),
            step: grid.step(),
            values,
        }
    }
    pub(super) fn empty(parameter: Parameter, grid: &UniformGrid) -> Self {
        Self {
            parameter,
            axis: grid.axis().to_vec(),
            step: grid.step(),
            values: Vec::new(),
        }
    }
    pub fn parameter(&self) -> Parameter {
        self.parameter
    }
    /// Checks if the field is a placeholder
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }
    /// Number of valid nodes
    pub fn n_valid(&self) -> usize {
        self.values.iter().flatten().count()
    }
    /// Value at the grid node the closest to `(x,y)`
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let index = |u: f64| {
            self.axis
                .iter()
                .position(|&a| (a - u).abs() < 0.5 * self.step)
        };
        let (col, row) = (index(x)?, index(y)?);
        self.values
            .get(row * self.axis.len() + col)
            .copied()
            .flatten()
    }
    /// Range of the valid values
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().fold(None, |mm, &v| match mm {
            None => Some((v, v)),
            Some((lo, hi)) => Some((v.min(lo), v.max(hi))),
        })
    }
    /// Masks the nodes excluded by `mask`
    pub fn apply_mask(&mut self, mask: &BoundaryMask) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        if mask.len() != self.values.len() {
            return Err(GridError::Shape {
                expected: self.values.len(),
                found: mask.len(),
            });
        }
        for (v, inside) in self.values.iter_mut().zip(mask.inside()) {
            if !inside {
                *v = None;
            }
        }
        Ok(())
    }
    /// Writes the field to a CSV file with one row per Y and one column per X
    ///
    /// A placeholder is written as the single header field `Y`.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut wtr = csv::Writer::from_path(path)?;
        if self.is_empty() {
            wtr.write_record(["Y"])?;
            wtr.flush().map_err(|e| GridError::Io(path.to_path_buf(), e))?;
            log::info!("{:?} saved (no data)", path);
            return Ok(());
        }
        wtr.write_record(
            std::iter::once("Y".to_string()).chain(self.axis.iter().map(|x| format!("{:?}", x))),
        )?;
        for (y, row) in self.axis.iter().zip(self.values.chunks(self.axis.len())) {
            wtr.write_record(
                std::iter::once(format!("{:?}", y)).chain(
                    row.iter()
                        .map(|v| v.map(|v| format!("{:?}", v)).unwrap_or_default()),
                ),
            )?;
        }
        wtr.flush().map_err(|e| GridError::Io(path.to_path_buf(), e))?;
        log::info!("{:?} saved", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn pivot_layout() -> std::result::Result<(), Box<dyn Error>> {
        let grid = UniformGrid::new(1., 1.)?;
        let values = vec![Some(1.), None, Some(3.), Some(4.5)];
        let field = InterpolatedField::new(Parameter::Density, &grid, values);
        let path = std::env::temp_dir().join(format!("wdxrf-pivot-{}.csv", std::process::id()));
        field.to_csv(&path)?;
        let contents = std::fs::read_to_string(&path)?;
        assert_eq!(contents, "Y,-0.5,0.5\n-0.5,1.0,\n0.5,3.0,4.5\n");
        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn placeholder() -> std::result::Result<(), Box<dyn Error>> {
        let grid = UniformGrid::new(10., 0.5)?;
        let mut field = InterpolatedField::empty(Parameter::Thickness, &grid);
        field.apply_mask(&BoundaryMask::new(&grid, 10., 2.5))?;
        assert!(field.is_empty());
        assert_eq!(field.min_max(), None);
        let path = std::env::temp_dir().join(format!("wdxrf-empty-{}.csv", std::process::id()));
        field.to_csv(&path)?;
        assert_eq!(std::fs::read_to_string(&path)?, "Y\n");
        std::fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn mask_reapplied_from_file() -> std::result::Result<(), Box<dyn Error>> {
        let grid = UniformGrid::new(3., 0.5)?;
        let mask = BoundaryMask::new(&grid, 3., 1.);
        let path = std::env::temp_dir().join(format!("wdxrf-remask-{}.npy", std::process::id()));
        mask.save(&path)?;
        let values: Vec<_> = grid.xy_iter().map(|(x, y)| Some(x + y)).collect();
        let mut first = InterpolatedField::new(Parameter::Density, &grid, values.clone());
        first.apply_mask(&mask)?;
        let mut second = InterpolatedField::new(Parameter::Density, &grid, values);
        second.apply_mask(&BoundaryMask::load(&path)?)?;
        assert_eq!(first, second);
        assert_eq!(first.n_valid(), mask.n_inside());
        std::fs::remove_file(&path)?;
        Ok(())
    }
}
