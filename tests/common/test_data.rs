//! Test data generation utilities.
//!
//! Functions that write small CF netCDF grids in RD New (EPSG:28992) with known values,
//! standing in for what the grid service returns.

use std::path::Path;

use netcdf::Error;
type Result<T> = std::result::Result<T, Error>;

/// Fill value written to the test grids
pub const NODATA: f64 = -999.0;

/// Western edge of the test grids
pub const WEST: f64 = 119000.0;
/// Southern edge of the test grids
pub const SOUTH: f64 = 449000.0;
/// Cell size in metres
pub const CELL: f64 = 1000.0;
pub const COLS: usize = 10;
pub const ROWS: usize = 6;
/// Hourly steps from 2015-01-01 01:00 up to and including 2015-01-02 00:00
pub const STEPS: usize = 24;

/// Writes an hourly precipitation grid where every valid cell of step `t` holds `t + 1`.
///
/// Cells listed in `nodata_cells` as `(row, col)` are written as [`NODATA`]; row 0 is
/// the southernmost row.
pub fn create_hourly_grid(path: &Path, nodata_cells: &[(usize, usize)]) -> Result<()> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", STEPS)?;
    file.add_dimension("y", ROWS)?;
    file.add_dimension("x", COLS)?;
    file.add_attribute("Conventions", "CF-1.6")?;
    file.add_attribute("title", "Hourly precipitation test grid")?;

    let times: Vec<f64> = (1..=STEPS).map(|h| h as f64).collect();
    let x: Vec<f64> = (0..COLS)
        .map(|i| WEST + CELL / 2.0 + i as f64 * CELL)
        .collect();
    let y: Vec<f64> = (0..ROWS)
        .map(|i| SOUTH + CELL / 2.0 + i as f64 * CELL)
        .collect();

    {
        let mut var = file.add_variable::<f64>("time", &["time"])?;
        var.put_attribute("units", "hours since 2015-01-01 00:00:00")?;
        var.put_attribute("standard_name", "time")?;
        var.put_values(&times, ..)?;
    }
    {
        let mut var = file.add_variable::<f64>("x", &["x"])?;
        var.put_attribute("units", "m")?;
        var.put_attribute("standard_name", "projection_x_coordinate")?;
        var.put_values(&x, ..)?;
    }
    {
        let mut var = file.add_variable::<f64>("y", &["y"])?;
        var.put_attribute("units", "m")?;
        var.put_attribute("standard_name", "projection_y_coordinate")?;
        var.put_values(&y, ..)?;
    }
    {
        let mut var = file.add_variable::<f64>("P", &["time", "y", "x"])?;
        var.set_fill_value(NODATA)?;
        var.put_attribute("units", "mm")?;
        var.put_attribute("long_name", "Precipitation")?;

        let mut data = Vec::with_capacity(STEPS * ROWS * COLS);
        for t in 0..STEPS {
            for r in 0..ROWS {
                for c in 0..COLS {
                    data.push(if nodata_cells.contains(&(r, c)) {
                        NODATA
                    } else {
                        (t + 1) as f64
                    });
                }
            }
        }
        var.put_values(&data, ..)?;
    }

    Ok(())
}

/// Reads a freshly generated grid back as the bytes the service would send.
pub fn hourly_grid_bytes(nodata_cells: &[(usize, usize)]) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("grid.nc");
    create_hourly_grid(&path, nodata_cells).expect("Failed to write test grid");
    std::fs::read(&path).expect("Failed to read test grid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_hourly_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.nc");
        create_hourly_grid(&path, &[(0, 0)]).unwrap();

        let file = netcdf::open(&path).unwrap();
        let var = file.variable("P").unwrap();
        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        assert_eq!(shape, vec![STEPS, ROWS, COLS]);
    }
}
