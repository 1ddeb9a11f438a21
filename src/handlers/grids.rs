//! Grid download and sampling endpoints.
//!
//! `POST /grids/file` returns the raw payload of a grid request, `POST /grids/sample`
//! the zonal statistics table for the geometries in the request.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::error_response;
use crate::config::parse_datetime;
use crate::crs::Crs;
use crate::error::{Result, WiwbError};
use crate::extent::Bounds;
use crate::geometry::GeometrySet;
use crate::logging::generate_request_id;
use crate::reconcile::ReconcilerConfig;
use crate::request::{DataFormat, GridRequest, Interval};
use crate::sample::Statistic;
use crate::state::AppState;

/// Body of the grid endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct GridQuery {
    pub data_source_code: String,
    pub variable_code: String,
    /// `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM:SS`
    #[serde(deserialize_with = "deserialize_datetime")]
    pub start: NaiveDateTime,
    #[serde(deserialize_with = "deserialize_datetime")]
    pub end: NaiveDateTime,
    /// `[xll, yll, xur, yur]`
    #[serde(default)]
    pub bounds: Option<Bounds>,
    /// GeoJSON FeatureCollection, Feature or Geometry
    #[serde(default)]
    pub geometries: Option<serde_json::Value>,
    /// EPSG code
    #[serde(default)]
    pub crs: Option<u32>,
    #[serde(default)]
    pub format: Option<DataFormat>,
    /// `{"Type": "Hours", "Value": 1}`
    #[serde(default)]
    pub interval: Option<Interval>,
    #[serde(default = "default_stats")]
    pub stats: Vec<Statistic>,
}

fn default_stats() -> Vec<Statistic> {
    vec![Statistic::Mean]
}

fn deserialize_datetime<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<NaiveDateTime, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_datetime(&text).map_err(serde::de::Error::custom)
}

impl GridQuery {
    /// Reconcile the query into a request
    pub fn to_request(&self, reconciler: &ReconcilerConfig) -> Result<GridRequest> {
        let mut builder = GridRequest::builder(
            self.data_source_code.clone(),
            self.variable_code.clone(),
            self.start,
            self.end,
        )
        .data_format(self.format.unwrap_or_default());

        if let Some(interval) = self.interval {
            builder = builder.interval(Some(interval));
        }
        if let Some(geometries) = &self.geometries {
            builder = builder.geometries(GeometrySet::from_geojson(&geometries.to_string())?);
        }
        if let Some(code) = self.crs {
            builder = builder.crs(Crs::from_epsg(code)?);
        }
        if let Some(bounds) = self.bounds {
            builder = builder.bounds(bounds);
        }

        builder.build(reconciler)
    }

    fn describe(&self) -> String {
        format!(
            "data_source_code={}, variable_code={}, start={}, end={}",
            self.data_source_code, self.variable_code, self.start, self.end
        )
    }
}

/// Run blocking core work off the async runtime
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| WiwbError::Io(std::io::Error::other(format!("Worker task failed: {}", e))))?
}

/// Handle POST /grids/file requests
pub async fn grid_file_handler(
    State(state): State<Arc<AppState>>,
    Json(query): Json<GridQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();
    debug!(
        endpoint = "/grids/file",
        request_id = %request_id,
        params = %query.describe(),
        "Processing grid file request"
    );

    let client = state.client.clone();
    let params = query.clone();
    let result = run_blocking(move || {
        let request = params.to_request(client.reconciler())?;
        let file_name = request.file_name();
        let mut grids = client.grids(request);
        Ok((file_name, grids.content()?))
    })
    .await;

    match result {
        Ok((file_name, bytes)) => {
            info!(
                endpoint = "/grids/file",
                request_id = %request_id,
                file_name = %file_name,
                bytes = bytes.len(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Grid file request successful"
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", file_name),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(error) => error_response(error, "/grids/file", &request_id, Some(&query.describe())),
    }
}

/// Handle POST /grids/sample requests
pub async fn grid_sample_handler(
    State(state): State<Arc<AppState>>,
    Json(query): Json<GridQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();
    debug!(
        endpoint = "/grids/sample",
        request_id = %request_id,
        params = %query.describe(),
        stats = ?query.stats,
        "Processing grid sample request"
    );

    let client = state.client.clone();
    let params = query.clone();
    let result = run_blocking(move || {
        let request = params.to_request(client.reconciler())?;
        client.grids(request).sample(&params.stats)
    })
    .await;

    match result {
        Ok(table) => {
            info!(
                endpoint = "/grids/sample",
                request_id = %request_id,
                rows = table.rows(),
                columns = table.columns().len(),
                duration_ms = start_time.elapsed().as_millis() as u64,
                "Grid sample request successful"
            );
            (StatusCode::OK, Json(table)).into_response()
        }
        Err(error) => error_response(error, "/grids/sample", &request_id, Some(&query.describe())),
    }
}
