//! Coordinate reference systems known to the grid engine.
//!
//! Only a handful of EPSG codes matter for the grid service, so the transforms are
//! implemented directly instead of binding to PROJ. Every transform pivots through
//! WGS84 geographic coordinates.
//!
//! The Amersfoort / RD New conversion uses the published polynomial approximation of
//! the RD to WGS84 transformation, which is accurate to well below a metre inside the
//! Netherlands.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, WiwbError};

/// Minimum extent width/height for CRSs measured in metres
pub const LINEAR_MIN_EXTENT: f64 = 10.0;

/// Minimum extent width/height for CRSs measured in degrees
pub const ANGULAR_MIN_EXTENT: f64 = 0.0001;

const EARTH_RADIUS: f64 = 6_378_137.0;

const RD_X0: f64 = 155_000.0;
const RD_Y0: f64 = 463_000.0;
const RD_PHI0: f64 = 52.155_174_40;
const RD_LAM0: f64 = 5.387_206_21;

// (p, q, K) terms of dX^p * dY^q, result in arc seconds
const RD_TO_LAT: [(i32, i32, f64); 11] = [
    (0, 1, 3235.65389),
    (2, 0, -32.58297),
    (0, 2, -0.24750),
    (2, 1, -0.84978),
    (0, 3, -0.06550),
    (2, 2, -0.01709),
    (1, 0, -0.00738),
    (4, 0, 0.00530),
    (2, 3, -0.00039),
    (4, 1, 0.00033),
    (1, 1, -0.00012),
];

const RD_TO_LON: [(i32, i32, f64); 12] = [
    (1, 0, 5260.52916),
    (1, 1, 105.94684),
    (1, 2, 2.45656),
    (3, 0, -0.81885),
    (1, 3, 0.05594),
    (3, 1, -0.05607),
    (0, 1, 0.01199),
    (3, 2, -0.00256),
    (1, 4, 0.00128),
    (0, 2, 0.00022),
    (2, 0, -0.00022),
    (5, 0, 0.00026),
];

// (p, q, R) terms of dPhi^p * dLam^q, result in metres
const WGS84_TO_RD_X: [(i32, i32, f64); 9] = [
    (0, 1, 190094.945),
    (1, 1, -11832.228),
    (2, 1, -114.221),
    (0, 3, -32.391),
    (1, 0, -0.705),
    (3, 1, -2.340),
    (1, 3, -0.608),
    (0, 2, -0.008),
    (2, 3, 0.148),
];

const WGS84_TO_RD_Y: [(i32, i32, f64); 10] = [
    (1, 0, 309056.544),
    (0, 2, 3638.893),
    (2, 0, 73.077),
    (1, 2, -157.984),
    (3, 0, 59.788),
    (0, 1, 0.433),
    (2, 2, -6.439),
    (1, 1, -0.032),
    (0, 4, 0.092),
    (1, 4, -0.054),
];

/// Native unit of a CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsUnit {
    /// Metres
    Linear,
    /// Degrees
    Angular,
}

/// A supported coordinate reference system, identified by its EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Crs(u32);

impl Crs {
    /// WGS84 geographic
    pub const WGS84: Crs = Crs(4326);
    /// ETRS89 geographic, treated as WGS84
    pub const ETRS89: Crs = Crs(4258);
    /// Web Mercator
    pub const WEB_MERCATOR: Crs = Crs(3857);
    /// Amersfoort / RD New
    pub const RD_NEW: Crs = Crs(28992);

    /// Look up a CRS by EPSG code
    pub fn from_epsg(code: u32) -> Result<Self> {
        match code {
            4326 | 4258 | 3857 | 28992 => Ok(Crs(code)),
            _ => Err(WiwbError::validation(format!(
                "Unsupported CRS EPSG:{}. Supported: 4326, 4258, 3857, 28992",
                code
            ))),
        }
    }

    /// The EPSG code
    pub fn epsg(&self) -> u32 {
        self.0
    }

    pub fn unit(&self) -> CrsUnit {
        match self.0 {
            4326 | 4258 => CrsUnit::Angular,
            _ => CrsUnit::Linear,
        }
    }

    /// Smallest width/height an extent in this CRS may have
    pub fn min_extent_size(&self) -> f64 {
        match self.unit() {
            CrsUnit::Linear => LINEAR_MIN_EXTENT,
            CrsUnit::Angular => ANGULAR_MIN_EXTENT,
        }
    }

    /// Transform a coordinate from this CRS into `to`.
    pub fn transform(&self, to: Crs, x: f64, y: f64) -> (f64, f64) {
        if *self == to {
            return (x, y);
        }
        let (lon, lat) = self.to_wgs84(x, y);
        to.from_wgs84(lon, lat)
    }

    fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64) {
        match self.0 {
            3857 => web_mercator_to_wgs84(x, y),
            28992 => rd_to_wgs84(x, y),
            _ => (x, y),
        }
    }

    fn from_wgs84(&self, lon: f64, lat: f64) -> (f64, f64) {
        match self.0 {
            3857 => wgs84_to_web_mercator(lon, lat),
            28992 => wgs84_to_rd(lon, lat),
            _ => (lon, lat),
        }
    }
}

impl TryFrom<u32> for Crs {
    type Error = WiwbError;

    fn try_from(code: u32) -> Result<Self> {
        Crs::from_epsg(code)
    }
}

impl From<Crs> for u32 {
    fn from(crs: Crs) -> u32 {
        crs.0
    }
}

impl FromStr for Crs {
    type Err = WiwbError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .rsplit(':')
            .next()
            .unwrap_or(trimmed)
            .parse::<u32>()
            .map_err(|_| WiwbError::validation(format!("Invalid CRS identifier: {}", s)))?;
        Crs::from_epsg(code)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

fn polynomial(terms: &[(i32, i32, f64)], a: f64, b: f64) -> f64 {
    terms
        .iter()
        .map(|&(p, q, k)| k * a.powi(p) * b.powi(q))
        .sum()
}

fn rd_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let dx = (x - RD_X0) * 1e-5;
    let dy = (y - RD_Y0) * 1e-5;
    let lat = RD_PHI0 + polynomial(&RD_TO_LAT, dx, dy) / 3600.0;
    let lon = RD_LAM0 + polynomial(&RD_TO_LON, dx, dy) / 3600.0;
    (lon, lat)
}

fn wgs84_to_rd(lon: f64, lat: f64) -> (f64, f64) {
    let dphi = 0.36 * (lat - RD_PHI0);
    let dlam = 0.36 * (lon - RD_LAM0);
    let x = RD_X0 + polynomial(&WGS84_TO_RD_X, dphi, dlam);
    let y = RD_Y0 + polynomial(&WGS84_TO_RD_Y, dphi, dlam);
    (x, y)
}

fn web_mercator_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    (lon, lat)
}

fn wgs84_to_web_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = EARTH_RADIUS * lon.to_radians();
    let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}
