//! Delaunay triangulation of the slot samples and piecewise linear rasterization

use super::UniformGrid;

// Tolerance on the barycentric coordinates for nodes lying on a triangle edge
const EDGE_TOLERANCE: f64 = 1e-9;

pub(super) struct Triangulation {
    nodes: Vec<[f64; 2]>,
    // index of the sample behind each node
    samples: Vec<usize>,
    triangles: Vec<[usize; 3]>,
}
impl Triangulation {
    /// Triangulates the samples
    ///
    /// Repeated coordinates keep their first sample.
    /// Returns `None` if there are less than 3 distinct samples or if they are all collinear.
    pub fn new(points: &[[f64; 2]]) -> Option<Self> {
        let mut nodes: Vec<[f64; 2]> = Vec::with_capacity(points.len());
        let mut samples = Vec::with_capacity(points.len());
        for (i, p) in points.iter().enumerate() {
            if !nodes.contains(p) {
                nodes.push(*p);
                samples.push(i);
            }
        }
        if nodes.len() < 3 || is_collinear(&nodes) {
            return None;
        }
        let del = triangle_rs::Delaunay::builder()
            .add_nodes(&nodes.iter().flat_map(|p| p.to_vec()).collect::<Vec<f64>>())
            .set_switches("Q")
            .build();
        let triangles: Vec<[usize; 3]> = del.triangle_iter().map(|t| [t[0], t[1], t[2]]).collect();
        if triangles.is_empty() {
            return None;
        }
        Some(Self {
            nodes,
            samples,
            triangles,
        })
    }
    /// Linear interpolation of the sample `values` at the grid nodes
    ///
    /// Nodes outside the convex hull of the samples are set to NaN.
    pub fn rasterize(&self, values: &[f64], grid: &UniformGrid) -> Vec<f64> {
        let n = grid.size();
        let mut raster = vec![f64::NAN; grid.len()];
        if n == 0 {
            return raster;
        }
        let (origin, step) = (grid.axis()[0], grid.step());
        // grid index range covering [lo,hi]
        let span = |lo: f64, hi: f64| -> Option<(usize, usize)> {
            let first = ((lo - origin) / step - EDGE_TOLERANCE).ceil().max(0.);
            let last = ((hi - origin) / step + EDGE_TOLERANCE)
                .floor()
                .min((n - 1) as f64);
            (first <= last).then_some((first as usize, last as usize))
        };
        for t in &self.triangles {
            let [a, b, c] = t.map(|i| self.nodes[i]);
            let [va, vb, vc] = t.map(|i| values[self.samples[i]]);
            let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
            if det.abs() < f64::EPSILON {
                continue;
            }
            let Some((col_first, col_last)) =
                span(a[0].min(b[0]).min(c[0]), a[0].max(b[0]).max(c[0]))
            else {
                continue;
            };
            let Some((row_first, row_last)) =
                span(a[1].min(b[1]).min(c[1]), a[1].max(b[1]).max(c[1]))
            else {
                continue;
            };
            for row in row_first..=row_last {
                let y = grid.axis()[row];
                for col in col_first..=col_last {
                    let k = row * n + col;
                    if !raster[k].is_nan() {
                        continue;
                    }
                    let x = grid.axis()[col];
                    let la = ((b[1] - c[1]) * (x - c[0]) + (c[0] - b[0]) * (y - c[1])) / det;
                    let lb = ((c[1] - a[1]) * (x - c[0]) + (a[0] - c[0]) * (y - c[1])) / det;
                    let lc = 1. - la - lb;
                    if la >= -EDGE_TOLERANCE && lb >= -EDGE_TOLERANCE && lc >= -EDGE_TOLERANCE {
                        raster[k] = la * va + lb * vb + lc * vc;
                    }
                }
            }
        }
        raster
    }
}

fn is_collinear(nodes: &[[f64; 2]]) -> bool {
    let a = nodes[0];
    let Some(b) = nodes.iter().skip(1).find(|&&p| p != a) else {
        return true;
    };
    let scale = nodes
        .iter()
        .map(|p| (p[0] - a[0]).hypot(p[1] - a[1]))
        .fold(0f64, f64::max);
    nodes.iter().all(|p| {
        let cross = (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]);
        cross.abs() <= 1e-12 * scale * scale
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collinear_samples() {
        assert!(is_collinear(&[[0., 0.], [1., 1.], [2., 2.], [-3., -3.]]));
        assert!(!is_collinear(&[[0., 0.], [1., 1.], [2., 2.1]]));
        assert!(Triangulation::new(&[[0., 0.], [0., 0.], [1., 0.]]).is_none());
    }

    #[test]
    fn square_interpolation() {
        let grid = UniformGrid::new(2., 0.5).unwrap();
        let points = [[-1., -1.], [1., -1.], [1., 1.], [-1., 1.]];
        let triangulation = Triangulation::new(&points).unwrap();
        let values: Vec<f64> = points.iter().map(|[x, y]| 3. * x - y).collect();
        let raster = triangulation.rasterize(&values, &grid);
        for ((x, y), v) in grid.xy_iter().zip(raster) {
            if x.abs() <= 1. && y.abs() <= 1. {
                assert!((v - (3. * x - y)).abs() < 1e-12, "({x},{y}): {v}");
            } else {
                assert!(v.is_nan());
            }
        }
    }
}
