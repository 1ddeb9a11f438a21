//! Print the structure of a netCDF grid and how wiwb decodes it.
//!
//! Usage: `inspect_grid <file.nc> [variable]`

use std::error::Error;
use std::path::PathBuf;

use wiwb::data_loader::load_grid;

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let file_path = PathBuf::from(
        args.next()
            .ok_or("Usage: inspect_grid <file.nc> [variable]")?,
    );
    let variable = args.next();

    println!("Inspecting NetCDF file: {}", file_path.display());
    let file = netcdf::open(&file_path)?;

    println!("\n=== FILE INFORMATION ===");

    println!("\nDimensions:");
    for dim in file.dimensions() {
        println!(
            "  {} = {} {}",
            dim.name(),
            dim.len(),
            if dim.is_unlimited() { "(unlimited)" } else { "" }
        );
    }

    println!("\nVariables:");
    for var in file.variables() {
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|dim| format!("{} = {}", dim.name(), dim.len()))
            .collect();
        println!("  {} ({:?}) [{}]", var.name(), var.vartype(), dims.join(", "));

        for attr in var.attributes() {
            match attr.value() {
                Ok(val) => println!("    {}: {:?}", attr.name(), val),
                Err(e) => println!("    {}: error reading value: {}", attr.name(), e),
            }
        }
    }

    println!("\n=== DECODED GRID ===");
    let grid = load_grid(&file_path, variable.as_deref())?;
    println!("\nVariable: {}", grid.variable);
    println!(
        "Shape: {} steps x {} rows x {} cols",
        grid.times.len(),
        grid.rows(),
        grid.cols()
    );
    println!("GeoTransform: {:?}", grid.transform.to_gdal());
    println!("Nodata: {:?}", grid.nodata);
    if let (Some(first), Some(last)) = (grid.times.first(), grid.times.last()) {
        println!("Time: {} .. {}", first, last);
    }

    let valid: Vec<f64> = grid
        .values
        .iter()
        .copied()
        .filter(|v| !grid.is_nodata(*v))
        .collect();
    if valid.is_empty() {
        println!("No valid values");
    } else {
        let min = valid.iter().copied().fold(f64::INFINITY, f64::min);
        let max = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = valid.iter().sum::<f64>() / valid.len() as f64;
        println!(
            "Valid cells: {} of {}, min {}, max {}, mean {:.4}",
            valid.len(),
            grid.values.len(),
            min,
            max,
            mean
        );
    }

    Ok(())
}
