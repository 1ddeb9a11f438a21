//! Grid requests and their wire format.
//!
//! A [`GridRequest`] is built once from caller parameters through
//! [`GridRequestBuilder::build`], which runs the spatial reconciliation. After that it
//! is immutable: changing a parameter means building a new request.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crs::Crs;
use crate::error::{Result, WiwbError};
use crate::extent::{Bounds, Extent};
use crate::geometry::GeometrySet;
use crate::reconcile::{reconcile, ReconcilerConfig, SpatialParams};

/// Timestamp format of `StartDate`/`EndDate`
pub const WIRE_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Output encodings offered by the grid service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataFormat {
    #[default]
    #[serde(rename = "geotiff")]
    GeoTiff,
    #[serde(rename = "aaigrid")]
    AaiGrid,
    #[serde(rename = "hdf5")]
    Hdf5,
    #[serde(rename = "netcdf4.cf1p6")]
    NetCdf,
    #[serde(rename = "netcdf4.cf1p6.zip")]
    NetCdfZip,
}

impl DataFormat {
    pub const ALL: [DataFormat; 5] = [
        DataFormat::GeoTiff,
        DataFormat::AaiGrid,
        DataFormat::Hdf5,
        DataFormat::NetCdf,
        DataFormat::NetCdfZip,
    ];

    /// The `DataFormatCode` sent to the service
    pub fn code(&self) -> &'static str {
        match self {
            DataFormat::GeoTiff => "geotiff",
            DataFormat::AaiGrid => "aaigrid",
            DataFormat::Hdf5 => "hdf5",
            DataFormat::NetCdf => "netcdf4.cf1p6",
            DataFormat::NetCdfZip => "netcdf4.cf1p6.zip",
        }
    }

    /// Suffix of the file the service returns for this format
    pub fn suffix(&self) -> &'static str {
        match self {
            DataFormat::GeoTiff => "zip",
            DataFormat::AaiGrid => "hdf5",
            DataFormat::Hdf5 => "hdf5",
            DataFormat::NetCdf => "nc",
            DataFormat::NetCdfZip => "zip",
        }
    }
}

impl FromStr for DataFormat {
    type Err = WiwbError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DataFormat::ALL
            .into_iter()
            .find(|format| format.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                WiwbError::validation(format!(
                    "Unknown data format: {}. Must be one of: geotiff, aaigrid, hdf5, netcdf4.cf1p6, netcdf4.cf1p6.zip",
                    s
                ))
            })
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unit of the sampling interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalType {
    Days,
    Hours,
    Minutes,
}

impl FromStr for IntervalType {
    type Err = WiwbError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "days" => Ok(IntervalType::Days),
            "hours" => Ok(IntervalType::Hours),
            "minutes" => Ok(IntervalType::Minutes),
            _ => Err(WiwbError::validation(format!(
                "Unknown interval type: {}. Must be one of: Days, Hours, Minutes",
                s
            ))),
        }
    }
}

/// Sampling interval of the requested series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Interval {
    #[serde(rename = "Type")]
    pub kind: IntervalType,
    pub value: u32,
}

impl Default for Interval {
    fn default() -> Self {
        Self {
            kind: IntervalType::Hours,
            value: 1,
        }
    }
}

/// `Settings` of the exporter
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExporterSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digits_to_round: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_projection_file: Option<bool>,
}

/// Top-level request body
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestBody {
    pub readers: Vec<Reader>,
    pub exporter: Exporter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reader {
    pub data_source_code: String,
    pub settings: ReaderSettings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReaderSettings {
    #[serde(serialize_with = "serialize_wire_date")]
    pub start_date: NaiveDateTime,
    #[serde(serialize_with = "serialize_wire_date")]
    pub end_date: NaiveDateTime,
    pub variable_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<ExtentBody>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtentBody {
    pub xll: f64,
    pub yll: f64,
    pub xur: f64,
    pub yur: f64,
    pub spatial_reference: SpatialReference,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpatialReference {
    pub epsg: u32,
}

impl From<&Extent> for ExtentBody {
    fn from(extent: &Extent) -> Self {
        Self {
            xll: extent.xll(),
            yll: extent.yll(),
            xur: extent.xur(),
            yur: extent.yur(),
            spatial_reference: SpatialReference {
                epsg: extent.crs().epsg(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Exporter {
    pub data_format_code: DataFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<ExporterSettings>,
}

fn serialize_wire_date<S: Serializer>(
    date: &NaiveDateTime,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&date.format(WIRE_DATE_FORMAT))
}

/// A reconciled, immutable grid request
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    data_source_code: String,
    variable_code: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval: Option<Interval>,
    data_format: DataFormat,
    exporter_settings: Option<ExporterSettings>,
    unzip: bool,
    extent: Extent,
    geometries: Option<GeometrySet>,
}

impl GridRequest {
    /// Start building a request for one variable of one data source
    pub fn builder(
        data_source_code: impl Into<String>,
        variable_code: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> GridRequestBuilder {
        GridRequestBuilder {
            data_source_code: data_source_code.into(),
            variable_code: variable_code.into(),
            start,
            end,
            interval: Some(Interval::default()),
            data_format: DataFormat::default(),
            exporter_settings: None,
            unzip: true,
            spatial: SpatialParams::default(),
        }
    }

    pub fn data_source_code(&self) -> &str {
        &self.data_source_code
    }

    pub fn variable_code(&self) -> &str {
        &self.variable_code
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn interval(&self) -> Option<Interval> {
        self.interval
    }

    pub fn data_format(&self) -> DataFormat {
        self.data_format
    }

    pub fn unzip(&self) -> bool {
        self.unzip
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn crs(&self) -> Crs {
        self.extent.crs()
    }

    pub fn geometries(&self) -> Option<&GeometrySet> {
        self.geometries.as_ref()
    }

    /// The same request with another output format
    pub fn with_format(&self, data_format: DataFormat) -> Self {
        Self {
            data_format,
            ..self.clone()
        }
    }

    /// Wire body for `grids/get`
    pub fn body(&self) -> RequestBody {
        RequestBody {
            readers: vec![Reader {
                data_source_code: self.data_source_code.clone(),
                settings: ReaderSettings {
                    start_date: self.start,
                    end_date: self.end,
                    variable_codes: vec![self.variable_code.clone()],
                    interval: self.interval,
                    extent: Some(ExtentBody::from(&self.extent)),
                },
            }],
            exporter: Exporter {
                data_format_code: self.data_format,
                settings: self.exporter_settings,
            },
        }
    }

    /// Wire body as JSON
    pub fn body_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.body())?)
    }

    /// File name for the payload, derived only from source, variable, period and format
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.{}",
            self.data_source_code,
            self.variable_code,
            file_date(&self.start),
            file_date(&self.end),
            self.data_format.suffix()
        )
    }
}

fn file_date(date: &NaiveDateTime) -> String {
    if date.time() == chrono::NaiveTime::MIN {
        date.format("%Y-%m-%d").to_string()
    } else {
        date.format("%Y-%m-%dT%H%M%S").to_string()
    }
}

/// Collects request parameters; [`build`](GridRequestBuilder::build) reconciles them.
#[derive(Debug, Clone)]
pub struct GridRequestBuilder {
    data_source_code: String,
    variable_code: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    interval: Option<Interval>,
    data_format: DataFormat,
    exporter_settings: Option<ExporterSettings>,
    unzip: bool,
    spatial: SpatialParams,
}

impl GridRequestBuilder {
    pub fn geometries(mut self, geometries: GeometrySet) -> Self {
        self.spatial.geometries = Some(geometries);
        self
    }

    pub fn crs(mut self, crs: Crs) -> Self {
        self.spatial.crs = Some(crs);
        self
    }

    pub fn bounds(mut self, bounds: Bounds) -> Self {
        self.spatial.bounds = Some(bounds);
        self
    }

    /// `None` leaves the interval out of the body
    pub fn interval(mut self, interval: Option<Interval>) -> Self {
        self.interval = interval;
        self
    }

    pub fn data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    pub fn exporter_settings(mut self, settings: ExporterSettings) -> Self {
        self.exporter_settings = Some(settings);
        self
    }

    pub fn unzip(mut self, unzip: bool) -> Self {
        self.unzip = unzip;
        self
    }

    /// Reconcile the spatial parameters and freeze the request.
    pub fn build(self, config: &ReconcilerConfig) -> Result<GridRequest> {
        if self.end < self.start {
            return Err(WiwbError::validation(format!(
                "End date {} is before start date {}",
                self.end, self.start
            )));
        }

        let spatial = reconcile(self.spatial, config)?;

        Ok(GridRequest {
            data_source_code: self.data_source_code,
            variable_code: self.variable_code,
            start: self.start,
            end: self.end,
            interval: self.interval,
            data_format: self.data_format,
            exporter_settings: self.exporter_settings,
            unzip: self.unzip,
            extent: spatial.extent,
            geometries: spatial.geometries,
        })
    }
}
