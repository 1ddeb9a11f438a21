//! Reconciliation of geometries, CRS and bounds into one consistent request extent.
//!
//! The three inputs depend on each other, so they are resolved in a fixed order, each
//! phase reading the already-updated result of the previous one:
//!
//! 1. geometries: the set is taken as given (its kinds were validated on construction)
//! 2. CRS: adopted from the geometries, used to label them, or used to reproject them
//! 3. bounds: derived from the geometries when present, otherwise required explicitly
//! 4. extent: validated and widened to the minimum size of the CRS unit

use tracing::{debug, warn};

use crate::crs::Crs;
use crate::error::{Result, WiwbError};
use crate::extent::{Bounds, Extent};
use crate::geometry::GeometrySet;

/// Settings for the reconciler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcilerConfig {
    /// CRS used when neither the caller nor the geometries name one
    pub default_crs: Option<Crs>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            default_crs: Some(Crs::RD_NEW),
        }
    }
}

impl ReconcilerConfig {
    /// A reconciler without a fallback CRS
    pub fn strict() -> Self {
        Self { default_crs: None }
    }
}

/// The caller-supplied spatial parameters, any of which may be absent
#[derive(Debug, Clone, Default)]
pub struct SpatialParams {
    pub geometries: Option<GeometrySet>,
    pub crs: Option<Crs>,
    pub bounds: Option<Bounds>,
}

/// A mutually consistent (extent, geometries, CRS) triple
#[derive(Debug, Clone, PartialEq)]
pub struct Spatial {
    pub extent: Extent,
    pub geometries: Option<GeometrySet>,
    pub crs: Crs,
}

/// Resolve the spatial parameters of a grid request.
pub fn reconcile(params: SpatialParams, config: &ReconcilerConfig) -> Result<Spatial> {
    let SpatialParams {
        geometries,
        crs,
        bounds,
    } = params;

    let (geometries, crs) = resolve_crs(geometries, crs, config)?;
    let bounds = resolve_bounds(geometries.as_ref(), bounds)?;

    let extent = match geometries {
        Some(_) => Extent::enclosing(bounds, crs)?,
        None => Extent::new(bounds, crs)?,
    };

    debug!(
        crs = %crs,
        xll = extent.xll(),
        yll = extent.yll(),
        xur = extent.xur(),
        yur = extent.yur(),
        geometries = geometries.as_ref().map_or(0, GeometrySet::len),
        "Reconciled spatial parameters"
    );

    Ok(Spatial {
        extent,
        geometries,
        crs,
    })
}

fn resolve_crs(
    geometries: Option<GeometrySet>,
    crs: Option<Crs>,
    config: &ReconcilerConfig,
) -> Result<(Option<GeometrySet>, Crs)> {
    match (geometries, crs) {
        (Some(set), requested) => match (requested, set.crs()) {
            (None, Some(own)) => Ok((Some(set), own)),
            (Some(requested), None) => Ok((Some(set.with_crs(requested)), requested)),
            (Some(requested), Some(_)) => Ok((Some(set.reproject(requested)?), requested)),
            (None, None) => match config.default_crs {
                Some(default) => Ok((Some(set.with_crs(default)), default)),
                None => Err(missing_crs()),
            },
        },
        (None, Some(requested)) => Ok((None, requested)),
        (None, None) => config
            .default_crs
            .map(|default| (None, default))
            .ok_or_else(missing_crs),
    }
}

fn resolve_bounds(geometries: Option<&GeometrySet>, bounds: Option<Bounds>) -> Result<Bounds> {
    match geometries {
        Some(set) => {
            if let Some(ignored) = bounds {
                warn!(
                    bounds = ?ignored,
                    "Bounds are ignored as long as geometries are given"
                );
            }
            set.total_bounds()
                .ok_or_else(|| WiwbError::validation("Geometries have no extent"))
        }
        None => bounds.ok_or_else(|| {
            WiwbError::configuration("Specify either 'geometries' or 'bounds', both are None")
        }),
    }
}

fn missing_crs() -> WiwbError {
    WiwbError::configuration("Specify CRS or a geometry set with a CRS")
}
