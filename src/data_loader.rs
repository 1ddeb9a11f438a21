//! NetCDF grid loading.
//!
//! Reads a CF-style netCDF file as returned by the grid service into a [`GridStack`]:
//! one 3-D data variable ordered `(time, y, x)`, its decoded time axis, an affine
//! transform for the cells and the nodata value.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use ndarray::{Array3, Axis};
use netcdf::Variable as NetCdfVariable;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::affine::Affine;
use crate::error::{Result, WiwbError};

const X_NAMES: [&str; 3] = ["x", "lon", "longitude"];
const Y_NAMES: [&str; 3] = ["y", "lat", "latitude"];

/// A multi-time-step grid held in memory
#[derive(Debug, Clone)]
pub struct GridStack {
    /// Name of the data variable
    pub variable: String,
    /// One instant per time step
    pub times: Vec<NaiveDateTime>,
    /// Values indexed `(time, row, col)`
    pub values: Array3<f64>,
    /// Maps `(col, row)` to world coordinates
    pub transform: Affine,
    pub nodata: Option<f64>,
}

impl GridStack {
    pub fn rows(&self) -> usize {
        self.values.len_of(Axis(1))
    }

    pub fn cols(&self) -> usize {
        self.values.len_of(Axis(2))
    }

    pub fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nodata| value == nodata)
    }
}

/// Load a grid stack from a netCDF file.
///
/// The data variable is `variable_code` when the file has it, otherwise the only
/// 3-D variable in the file.
pub fn load_grid(path: &Path, variable_code: Option<&str>) -> Result<GridStack> {
    if !path.exists() {
        return Err(WiwbError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: {}", path.display()),
        )));
    }

    let file = netcdf::open(path)?;
    info!("Opened NetCDF file: {}", path.display());

    let var = select_variable(&file, variable_code)?;
    let name = var.name();
    let dims = var.dimensions();
    let (time_dim, y_dim, x_dim) = (dims[0].name(), dims[1].name(), dims[2].name());
    let shape = (dims[0].len(), dims[1].len(), dims[2].len());
    debug!(
        variable = %name,
        time = shape.0,
        rows = shape.1,
        cols = shape.2,
        "Selected data variable"
    );

    if !Y_NAMES.contains(&y_dim.as_str()) || !X_NAMES.contains(&x_dim.as_str()) {
        return Err(WiwbError::validation(format!(
            "Variable {} must be ordered (time, y, x), got ({}, {}, {})",
            name, time_dim, y_dim, x_dim
        )));
    }

    let raw: Vec<f64> = var.get_values::<f64, _>(..)?;
    let mut values = Array3::from_shape_vec(shape, raw).map_err(|e| {
        WiwbError::validation(format!("Variable {} has an inconsistent shape: {}", name, e))
    })?;

    let nodata = match numeric_attribute(&var, "_FillValue")? {
        Some(fill) => Some(fill),
        None => numeric_attribute(&var, "missing_value")?,
    };
    apply_packing(&var, &mut values, nodata)?;

    let x = coordinate_values(&file, &x_dim)?;
    let y = coordinate_values(&file, &y_dim)?;

    let transform = match geo_transform(&file, &var)? {
        Some(transform) => {
            // GDAL writes rows south to north while its geotransform runs north to south
            if transform.e < 0.0 && y.as_ref().is_some_and(|y| is_ascending(y)) {
                values.invert_axis(Axis(1));
            }
            transform
        }
        None => transform_from_coordinates(x.as_deref(), y.as_deref())?,
    };

    let times = decode_times(&file, &time_dim, shape.0)?;

    info!(
        variable = %name,
        steps = times.len(),
        rows = shape.1,
        cols = shape.2,
        nodata = ?nodata,
        "Loaded grid"
    );

    Ok(GridStack {
        variable: name,
        times,
        values,
        transform,
        nodata,
    })
}

fn select_variable<'f>(
    file: &'f netcdf::File,
    variable_code: Option<&str>,
) -> Result<NetCdfVariable<'f>> {
    if let Some(code) = variable_code {
        if let Some(var) = file.variable(code) {
            if var.dimensions().len() != 3 {
                return Err(WiwbError::validation(format!(
                    "Variable {} has {} dimensions, expected (time, y, x)",
                    code,
                    var.dimensions().len()
                )));
            }
            return Ok(var);
        }
        debug!(variable = code, "Variable not in file, looking for a single 3-D variable");
    }

    let mut candidates: Vec<NetCdfVariable<'f>> = file
        .variables()
        .filter(|var| var.dimensions().len() == 3)
        .collect();

    match candidates.len() {
        1 => Ok(candidates.remove(0)),
        0 => Err(WiwbError::validation("No 3-D data variable found in file")),
        _ => Err(WiwbError::validation(format!(
            "Ambiguous data variable, choose one of: {}",
            candidates
                .iter()
                .map(|var| var.name())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// Read a numeric attribute; strings holding a number are accepted too
fn numeric_attribute(var: &NetCdfVariable, name: &str) -> Result<Option<f64>> {
    use netcdf::AttributeValue;

    let Some(attr) = var.attribute(name) else {
        return Ok(None);
    };

    let value = match attr.value()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Uint(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Ushort(v) => Some(v as f64),
        AttributeValue::Schar(v) => Some(v as f64),
        AttributeValue::Uchar(v) => Some(v as f64),
        AttributeValue::Longlong(v) => Some(v as f64),
        AttributeValue::Ulonglong(v) => Some(v as f64),
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|v| *v as f64),
        AttributeValue::Str(s) => s.trim().parse().ok(),
        other => {
            warn!(attribute = name, value = ?other, "Ignoring non-numeric attribute");
            None
        }
    };
    Ok(value)
}

fn string_attribute(var: &NetCdfVariable, name: &str) -> Result<Option<String>> {
    match var.attribute(name) {
        Some(attr) => match attr.value()? {
            netcdf::AttributeValue::Str(s) => Ok(Some(s)),
            _ => Ok(None),
        },
        None => Ok(None),
    }
}

/// Unpack `scale_factor`/`add_offset`, leaving nodata cells untouched
fn apply_packing(var: &NetCdfVariable, values: &mut Array3<f64>, nodata: Option<f64>) -> Result<()> {
    let scale = numeric_attribute(var, "scale_factor")?;
    let offset = numeric_attribute(var, "add_offset")?;
    if scale.is_none() && offset.is_none() {
        return Ok(());
    }

    let (scale, offset) = (scale.unwrap_or(1.0), offset.unwrap_or(0.0));
    values.mapv_inplace(|v| {
        if v.is_nan() || nodata == Some(v) {
            v
        } else {
            v * scale + offset
        }
    });
    Ok(())
}

fn coordinate_values(file: &netcdf::File, name: &str) -> Result<Option<Vec<f64>>> {
    match file.variable(name) {
        Some(var) => Ok(Some(var.get_values::<f64, _>(..)?)),
        None => Ok(None),
    }
}

/// A GDAL `GeoTransform` on the data variable or its grid mapping variable
fn geo_transform(file: &netcdf::File, var: &NetCdfVariable) -> Result<Option<Affine>> {
    let mut text = string_attribute(var, "GeoTransform")?;
    if text.is_none() {
        if let Some(mapping) = string_attribute(var, "grid_mapping")? {
            if let Some(mapping_var) = file.variable(mapping.trim()) {
                text = string_attribute(&mapping_var, "GeoTransform")?;
            }
        }
    }

    let Some(text) = text else {
        return Ok(None);
    };

    let parts: Vec<f64> = text
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|_| WiwbError::validation(format!("Unreadable GeoTransform: {}", text)))?;

    let gt: [f64; 6] = parts
        .try_into()
        .map_err(|_| WiwbError::validation(format!("GeoTransform needs 6 numbers: {}", text)))?;
    Ok(Some(Affine::from_gdal(gt)))
}

fn is_ascending(values: &[f64]) -> bool {
    values.len() > 1 && values[1] > values[0]
}

fn spacing(name: &str, values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(WiwbError::validation(format!(
            "Cannot derive cell size from {} with {} value(s)",
            name,
            values.len()
        )));
    }

    let step = values[1] - values[0];
    let tolerance = step.abs() * 1e-6;
    let regular = values
        .windows(2)
        .all(|pair| ((pair[1] - pair[0]) - step).abs() <= tolerance);
    if step == 0.0 || !regular {
        return Err(WiwbError::validation(format!(
            "Coordinate {} is not regularly spaced",
            name
        )));
    }
    Ok(step)
}

/// Affine transform from cell-centre coordinates, in file row order
fn transform_from_coordinates(x: Option<&[f64]>, y: Option<&[f64]>) -> Result<Affine> {
    let (Some(x), Some(y)) = (x, y) else {
        return Err(WiwbError::validation(
            "Grid has neither a GeoTransform nor x/y coordinate variables",
        ));
    };

    let dx = spacing("x", x)?;
    let dy = spacing("y", y)?;
    Ok(Affine {
        a: dx,
        b: 0.0,
        c: x[0] - dx / 2.0,
        d: 0.0,
        e: dy,
        f: y[0] - dy / 2.0,
    })
}

fn decode_times(file: &netcdf::File, name: &str, steps: usize) -> Result<Vec<NaiveDateTime>> {
    let var = file.variable(name).ok_or_else(|| {
        WiwbError::validation(format!("Time dimension {} has no coordinate variable", name))
    })?;
    let units = string_attribute(&var, "units")?.ok_or_else(|| {
        WiwbError::validation(format!("Time variable {} has no units", name))
    })?;

    let offsets: Vec<f64> = var.get_values::<f64, _>(..)?;
    if offsets.len() != steps {
        return Err(WiwbError::validation(format!(
            "Time variable {} has {} values for {} steps",
            name,
            offsets.len(),
            steps
        )));
    }

    let (step_ms, reference) = parse_time_units(&units)?;
    Ok(offsets
        .into_iter()
        .map(|offset| reference + Duration::milliseconds((offset * step_ms).round() as i64))
        .collect())
}

/// Parse CF time units like `hours since 1900-01-01 00:00:00` into
/// (milliseconds per unit, reference instant)
pub fn parse_time_units(units: &str) -> Result<(f64, NaiveDateTime)> {
    let invalid = || WiwbError::validation(format!("Unsupported time units: {}", units));

    let (unit, reference) = units.split_once(" since ").ok_or_else(invalid)?;
    let step_ms = match unit.trim().to_lowercase().as_str() {
        "seconds" | "second" | "secs" | "sec" | "s" => 1_000.0,
        "minutes" | "minute" | "mins" | "min" => 60_000.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3_600_000.0,
        "days" | "day" | "d" => 86_400_000.0,
        _ => return Err(invalid()),
    };

    let reference = reference
        .trim()
        .trim_end_matches(" UTC")
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim();

    let parsed = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(reference, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(reference, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(invalid)?;

    Ok((step_ms, parsed))
}

/// Write a small RD New grid for tests: 3 hourly steps, 4 rows, 5 columns of 1 km,
/// y ascending, cell `(t, r, c)` holding `t * 100 + r * 10 + c`, and cell (0, 0)
/// set to the fill value in every step.
#[cfg(test)]
pub(crate) fn create_test_grid(path: &Path) -> Result<()> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", 3)?;
    file.add_dimension("y", 4)?;
    file.add_dimension("x", 5)?;
    file.add_attribute("Conventions", "CF-1.6")?;

    let x: Vec<f64> = (0..5).map(|i| 120500.0 + i as f64 * 1000.0).collect();
    let y: Vec<f64> = (0..4).map(|i| 450500.0 + i as f64 * 1000.0).collect();

    {
        let mut var = file.add_variable::<f64>("time", &["time"])?;
        var.put_attribute("units", "hours since 2015-01-01 00:00:00")?;
        var.put_values(&[1.0, 2.0, 3.0], ..)?;
    }
    {
        let mut var = file.add_variable::<f64>("x", &["x"])?;
        var.put_values(&x, ..)?;
    }
    {
        let mut var = file.add_variable::<f64>("y", &["y"])?;
        var.put_values(&y, ..)?;
    }
    {
        let mut var = file.add_variable::<f64>("P", &["time", "y", "x"])?;
        var.set_fill_value(-999.0f64)?;
        var.put_attribute("units", "mm")?;
        let mut data = Vec::with_capacity(60);
        for t in 0..3 {
            for r in 0..4 {
                for c in 0..5 {
                    data.push(if r == 0 && c == 0 {
                        -999.0
                    } else {
                        (t * 100 + r * 10 + c) as f64
                    });
                }
            }
        }
        var.put_values(&data, ..)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn datetime(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 1, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_file_not_found() {
        match load_grid(Path::new("/nonexistent/file.nc"), None) {
            Err(WiwbError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("Expected IO error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_grid() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("grid.nc");
        create_test_grid(&path)?;

        let grid = load_grid(&path, Some("P"))?;
        assert_eq!(grid.variable, "P");
        assert_eq!(grid.values.shape(), &[3, 4, 5]);
        assert_eq!(grid.times, vec![datetime(1), datetime(2), datetime(3)]);
        assert_eq!(grid.nodata, Some(-999.0));
        assert_eq!(grid.values[[1, 2, 3]], 123.0);
        assert!(grid.is_nodata(grid.values[[0, 0, 0]]));

        // Cell centres land on the coordinate values
        assert_eq!(grid.transform.cell_centre(0, 0), (120500.0, 450500.0));
        assert_eq!(grid.transform.cell_of(122700.0, 451100.0), Some((1, 2)));
        Ok(())
    }

    #[test]
    fn test_single_variable_is_found_without_code() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("grid.nc");
        create_test_grid(&path)?;

        let grid = load_grid(&path, Some("Evaporation"))?;
        assert_eq!(grid.variable, "P");
        let grid = load_grid(&path, None)?;
        assert_eq!(grid.variable, "P");
        Ok(())
    }

    #[test]
    fn test_time_units() {
        let (step, reference) = parse_time_units("hours since 1900-01-01 00:00:00").unwrap();
        assert_eq!(step, 3_600_000.0);
        assert_eq!(
            reference,
            NaiveDate::from_ymd_opt(1900, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );

        let (step, reference) = parse_time_units("days since 2015-01-01").unwrap();
        assert_eq!(step, 86_400_000.0);
        assert_eq!(reference, datetime(0));

        let (step, _) = parse_time_units("minutes since 2015-01-01T00:00:00Z").unwrap();
        assert_eq!(step, 60_000.0);

        assert!(parse_time_units("fortnights since 2015-01-01").is_err());
        assert!(parse_time_units("hours").is_err());
    }

    #[test]
    fn test_irregular_coordinates_fail() {
        assert!(transform_from_coordinates(Some(&[0.0, 1.0, 3.0]), Some(&[0.0, 1.0])).is_err());
        assert!(transform_from_coordinates(Some(&[0.0]), Some(&[0.0, 1.0])).is_err());
        assert!(transform_from_coordinates(None, Some(&[0.0, 1.0])).is_err());
    }

    #[test]
    fn test_descending_y_gives_north_up_transform() {
        let transform =
            transform_from_coordinates(Some(&[0.5, 1.5, 2.5]), Some(&[9.5, 8.5])).unwrap();
        assert_eq!(transform, Affine::north_up(0.0, 10.0, 1.0, 1.0));
    }
}
