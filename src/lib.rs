//! # wiwb
//!
//! Grid request and sampling client for the WIWB hydro-meteorological grid service.
//!
//! The crate turns a space-time window into a grid request, fetches the grid with an
//! expiring bearer-token session and reduces it to per-geometry statistics or writes
//! it to disk.
//!
//! ## Architecture
//!
//! - **Session** ([`auth`]): client-credentials token, refreshed when it nears expiry
//! - **Spatial reconciliation** ([`reconcile`]): geometries, CRS and bounds resolved
//!   in a fixed order into one extent
//! - **Requests** ([`request`], [`client`]): immutable [`GridRequest`]s, executed by
//!   a [`Client`] over an [`HttpClient`](transport::HttpClient)
//! - **Sampling** ([`data_loader`], [`sample`]): netCDF grids reduced to a time-indexed
//!   [`ZonalResult`]
//! - **Web layer** ([`handlers`]): a thin axum API over the blocking core

pub mod affine;
pub mod auth;
pub mod client;
pub mod config;
pub mod crs;
pub mod data_loader;
pub mod error;
pub mod extent;
pub mod geometry;
pub mod handlers;
pub mod logging;
pub mod reconcile;
pub mod request;
pub mod sample;
pub mod state;
pub mod transport;

pub use client::{Client, GetGrids};
pub use config::Config;
pub use crs::Crs;
pub use error::{Result, WiwbError};
pub use extent::{Bounds, Extent};
pub use geometry::GeometrySet;
pub use logging::{
    create_http_trace_layer, generate_request_id, init_tracing, log_error, log_operation_end,
    log_operation_start, log_request_error, log_sample_stats, log_timed_operation,
};
pub use reconcile::ReconcilerConfig;
pub use request::{DataFormat, GridRequest, Interval, IntervalType};
pub use sample::{Statistic, ZonalResult};
pub use state::AppState;
