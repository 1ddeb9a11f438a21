//! Zonal sampling of grid stacks.
//!
//! Each geometry covers a fixed set of cells: a point covers the cell it falls in,
//! a (multi)polygon covers every cell whose centre lies inside it or on its boundary.
//! Per time step the requested statistics are computed over the covered cells that
//! are not nodata. A geometry without valid cells yields no value.

pub mod result;
pub mod stats;

pub use result::ZonalResult;
pub use stats::{parse_statistics, Statistic};

use geo::{BoundingRect, Intersects};
use geo_types::{Geometry, Point};
use ndarray::{s, ArrayView2};
use tracing::debug;

use crate::affine::Affine;
use crate::data_loader::GridStack;
use crate::error::{Result, WiwbError};
use crate::geometry::GeometrySet;

/// Compute zonal statistics for every geometry and time step of `grid`.
pub fn zonal_stats(
    grid: &GridStack,
    geometries: &GeometrySet,
    statistics: &[Statistic],
) -> Result<ZonalResult> {
    if statistics.is_empty() {
        return Err(WiwbError::validation("At least one statistic is required"));
    }

    let coverage = geometries
        .geometries()
        .iter()
        .map(|geometry| covered_cells(geometry, &grid.transform, grid.rows(), grid.cols()))
        .collect::<Result<Vec<_>>>()?;

    for ((label, _), cells) in geometries.iter().zip(&coverage) {
        debug!(label, cells = cells.len(), "Geometry coverage");
    }

    let mut rows = Vec::with_capacity(grid.times.len());
    let mut buffer = Vec::new();
    for t in 0..grid.times.len() {
        let step = grid.values.slice(s![t, .., ..]);
        let mut row = Vec::with_capacity(coverage.len() * statistics.len());
        for cells in &coverage {
            collect_valid(grid, step, cells, &mut buffer);
            row.extend(statistics.iter().map(|stat| stat.compute(&mut buffer)));
        }
        rows.push(row);
    }

    Ok(ZonalResult::new(
        grid.times.clone(),
        geometries.labels().to_vec(),
        statistics.to_vec(),
        rows,
    ))
}

fn collect_valid(
    grid: &GridStack,
    step: ArrayView2<f64>,
    cells: &[(usize, usize)],
    buffer: &mut Vec<f64>,
) {
    buffer.clear();
    buffer.extend(
        cells
            .iter()
            .map(|&(row, col)| step[[row, col]])
            .filter(|&v| !grid.is_nodata(v)),
    );
}

/// The (row, col) cells of a `rows` x `cols` grid covered by a geometry
pub fn covered_cells(
    geometry: &Geometry<f64>,
    transform: &Affine,
    rows: usize,
    cols: usize,
) -> Result<Vec<(usize, usize)>> {
    let inverse = transform
        .inverse()
        .ok_or_else(|| WiwbError::Sampling {
            message: "Grid transform is not invertible".to_string(),
        })?;
    let in_grid = |(row, col): (f64, f64)| -> Option<(usize, usize)> {
        let (row, col) = (row.floor(), col.floor());
        (row >= 0.0 && col >= 0.0 && row < rows as f64 && col < cols as f64)
            .then_some((row as usize, col as usize))
    };

    if let Geometry::Point(point) = geometry {
        let (col, row) = inverse.apply(point.x(), point.y());
        return Ok(in_grid((row, col)).into_iter().collect());
    }

    let Some(rect) = geometry.bounding_rect() else {
        return Ok(Vec::new());
    };

    // Candidate window from the corners of the bounding box, widened by one cell
    let corners = [
        (rect.min().x, rect.min().y),
        (rect.min().x, rect.max().y),
        (rect.max().x, rect.min().y),
        (rect.max().x, rect.max().y),
    ]
    .map(|(x, y)| inverse.apply(x, y));
    let col_min = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min).floor() - 1.0;
    let col_max = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max).ceil() + 1.0;
    let row_min = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min).floor() - 1.0;
    let row_max = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max).ceil() + 1.0;

    let clamp = |v: f64, n: usize| v.max(0.0).min(n as f64) as usize;
    let (r0, r1) = (clamp(row_min, rows), clamp(row_max, rows));
    let (c0, c1) = (clamp(col_min, cols), clamp(col_max, cols));

    let mut cells = Vec::new();
    for row in r0..r1 {
        for col in c0..c1 {
            let (x, y) = transform.cell_centre(row, col);
            if geometry.intersects(&Point::new(x, y)) {
                cells.push((row, col));
            }
        }
    }
    Ok(cells)
}
