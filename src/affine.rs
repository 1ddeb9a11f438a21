//! Affine georeferencing of grid cells.

/// Mapping from (column, row) pixel-edge coordinates to world coordinates:
///
/// - x = a * col + b * row + c
/// - y = d * col + e * row + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine {
    pub fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 0.0,
            e: 1.0,
            f: 0.0,
        }
    }

    /// North-up grid with its upper-left corner at (`west`, `north`)
    pub fn north_up(west: f64, north: f64, cell_width: f64, cell_height: f64) -> Self {
        Self {
            a: cell_width,
            b: 0.0,
            c: west,
            d: 0.0,
            e: -cell_height,
            f: north,
        }
    }

    /// From a GDAL geotransform `[c, a, b, f, d, e]`
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            a: gt[1],
            b: gt[2],
            c: gt[0],
            d: gt[4],
            e: gt[5],
            f: gt[3],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// World coordinates of the centre of a cell
    pub fn cell_centre(&self, row: usize, col: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// The inverse mapping, `None` for a singular transform
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.e - self.b * self.d;
        // Relative to the terms, so fine geographic grids stay invertible
        let scale = (self.a * self.e).abs().max((self.b * self.d).abs());
        if !det.is_finite() || det.abs() <= scale * f64::EPSILON {
            return None;
        }

        let a = self.e / det;
        let b = -self.b / det;
        let d = -self.d / det;
        let e = self.a / det;
        Some(Self {
            a,
            b,
            c: -(a * self.c + b * self.f),
            d,
            e,
            f: -(d * self.c + e * self.f),
        })
    }

    /// (row, col) of the cell containing a world coordinate, possibly outside the grid
    pub fn cell_of(&self, x: f64, y: f64) -> Option<(i64, i64)> {
        let (col, row) = self.inverse()?.apply(x, y);
        Some((row.floor() as i64, col.floor() as i64))
    }
}
