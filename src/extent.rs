//! Bounding boxes and request extents.
//!
//! An [`Extent`] is a bounding box tied to a CRS. Construction validates the box and then
//! widens it symmetrically until it reaches the minimum size the grid service accepts
//! for the CRS unit. Widening only ever logs a warning.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::crs::Crs;
use crate::error::{Result, WiwbError};

/// An axis-aligned box `(xll, yll, xur, yur)` without a CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Bounds {
    pub xll: f64,
    pub yll: f64,
    pub xur: f64,
    pub yur: f64,
}

impl Bounds {
    pub fn new(xll: f64, yll: f64, xur: f64, yur: f64) -> Self {
        Self { xll, yll, xur, yur }
    }

    pub fn width(&self) -> f64 {
        self.xur - self.xll
    }

    pub fn height(&self) -> f64 {
        self.yur - self.yll
    }

    /// Smallest box containing both boxes
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            xll: self.xll.min(other.xll),
            yll: self.yll.min(other.yll),
            xur: self.xur.max(other.xur),
            yur: self.yur.max(other.yur),
        }
    }
}

impl From<[f64; 4]> for Bounds {
    fn from(b: [f64; 4]) -> Self {
        Bounds::new(b[0], b[1], b[2], b[3])
    }
}

impl From<Bounds> for [f64; 4] {
    fn from(b: Bounds) -> Self {
        [b.xll, b.yll, b.xur, b.yur]
    }
}

/// Parse `"xll,yll,xur,yur"`
impl FromStr for Bounds {
    type Err = WiwbError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(WiwbError::validation(
                "Bounds must be in format 'xll,yll,xur,yur'",
            ));
        }

        let mut values = [0.0; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse::<f64>()
                .map_err(|_| WiwbError::validation(format!("Invalid bounds value: {}", part)))?;
        }

        Ok(Bounds::from(values))
    }
}

/// The spatial extent of a grid request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    xll: f64,
    yll: f64,
    xur: f64,
    yur: f64,
    crs: Crs,
}

impl Extent {
    /// Build an extent from explicit bounds. Fails unless `xur > xll` and `yur > yll`.
    pub fn new(bounds: Bounds, crs: Crs) -> Result<Self> {
        if !(bounds.width() > 0.0) {
            return Err(WiwbError::validation(format!(
                "'xll' ({}) should be smaller than 'xur' ({})",
                bounds.xll, bounds.xur
            )));
        }
        if !(bounds.height() > 0.0) {
            return Err(WiwbError::validation(format!(
                "'yll' ({}) should be smaller than 'yur' ({})",
                bounds.yll, bounds.yur
            )));
        }

        Ok(Self::corrected(bounds, crs))
    }

    /// Build an extent enclosing geometry bounds.
    ///
    /// Geometry bounds may be degenerate (a single point has zero width); those are
    /// widened like any other undersized extent. Inverted bounds still fail.
    pub fn enclosing(bounds: Bounds, crs: Crs) -> Result<Self> {
        if !(bounds.width() >= 0.0 && bounds.height() >= 0.0) {
            return Err(WiwbError::validation(format!(
                "Geometry bounds are not a valid box: {:?}",
                bounds
            )));
        }

        Ok(Self::corrected(bounds, crs))
    }

    fn corrected(bounds: Bounds, crs: Crs) -> Self {
        let mut extent = Self {
            xll: bounds.xll,
            yll: bounds.yll,
            xur: bounds.xur,
            yur: bounds.yur,
            crs,
        };
        extent.correct_bounds();
        extent
    }

    fn correct_bounds(&mut self) {
        let min_size = self.crs.min_extent_size();

        let width = self.width();
        if width < min_size {
            warn!(
                width = width,
                min_width = min_size,
                xll = self.xll,
                xur = self.xur,
                "Width of bounds below minimum, xll and xur will be adjusted"
            );
            let pad = (min_size - width) / 2.0;
            self.xll -= pad;
            self.xur += pad;
        }

        let height = self.height();
        if height < min_size {
            warn!(
                height = height,
                min_height = min_size,
                yll = self.yll,
                yur = self.yur,
                "Height of bounds below minimum, yll and yur will be adjusted"
            );
            let pad = (min_size - height) / 2.0;
            self.yll -= pad;
            self.yur += pad;
        }
    }

    pub fn xll(&self) -> f64 {
        self.xll
    }

    pub fn yll(&self) -> f64 {
        self.yll
    }

    pub fn xur(&self) -> f64 {
        self.xur
    }

    pub fn yur(&self) -> f64 {
        self.yur
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn width(&self) -> f64 {
        self.xur - self.xll
    }

    pub fn height(&self) -> f64 {
        self.yur - self.yll
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.xll, self.yll, self.xur, self.yur)
    }
}
