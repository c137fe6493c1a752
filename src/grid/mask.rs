//! Wafer edge exclusion mask

use super::{GridError, Result, UniformGrid};
use npyz::WriterBuilder;
use std::{fs::File, io::BufWriter, path::Path};

/// Grid nodes within the valid radius of the wafer
///
/// A node is valid if its distance to the wafer center is strictly less than
/// `radius - edge_exclusion`.
/// The mask is saved as a `[n,n]` boolean array where `true` marks an excluded node.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryMask {
    size: usize,
    inside: Vec<bool>,
}
impl BoundaryMask {
    pub fn new(grid: &UniformGrid, radius: f64, edge_exclusion: f64) -> Self {
        let valid_radius = radius - edge_exclusion;
        let inside = grid
            .xy_iter()
            .map(|(x, y)| x.hypot(y) < valid_radius)
            .collect();
        Self {
            size: grid.size(),
            inside,
        }
    }
    /// Number of nodes along an axis
    pub fn size(&self) -> usize {
        self.size
    }
    pub fn len(&self) -> usize {
        self.inside.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inside.is_empty()
    }
    /// Validity of the nodes, row-major
    pub fn inside(&self) -> &[bool] {
        &self.inside
    }
    /// Number of valid nodes
    pub fn n_inside(&self) -> usize {
        self.inside.iter().filter(|&&v| v).count()
    }
    /// Saves the mask to a numpy file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let io_err = |e| GridError::Io(path.to_path_buf(), e);
        let file = File::create(path).map_err(io_err)?;
        let mut writer = npyz::WriteOptions::<bool>::new()
            .default_dtype()
            .shape(&[self.size as u64, self.size as u64])
            .writer(BufWriter::new(file))
            .begin_nd()
            .map_err(io_err)?;
        for &inside in &self.inside {
            writer.push(&!inside).map_err(io_err)?;
        }
        writer.finish().map_err(io_err)?;
        log::info!("{:?} saved", path);
        Ok(())
    }
    /// Loads a mask from a numpy file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let io_err = |e| GridError::Io(path.to_path_buf(), e);
        let bytes = std::fs::read(path).map_err(io_err)?;
        let npy = npyz::NpyFile::new(&bytes[..]).map_err(io_err)?;
        let shape = npy.shape().to_vec();
        let data: Vec<bool> = npy.into_vec().map_err(io_err)?;
        let size = shape.first().copied().unwrap_or_default() as usize;
        if shape.len() != 2 || shape[0] != shape[1] || data.len() != size * size {
            return Err(GridError::Shape {
                expected: size * size,
                found: data.len(),
            });
        }
        Ok(Self {
            size,
            inside: data.into_iter().map(|masked| !masked).collect(),
        })
    }
}
