//! WIWB API client and grid request execution.
//!
//! [`Client`] owns the shared [`Session`] and transport. [`GetGrids`] pairs one
//! [`GridRequest`] with the most recent response for it: downloading, writing and
//! sampling all go through it.

use bytes::Bytes;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::auth::Session;
use crate::config::Config;
use crate::data_loader::load_grid;
use crate::error::{Result, WiwbError};
use crate::reconcile::ReconcilerConfig;
use crate::request::{DataFormat, GridRequest};
use crate::sample::{zonal_stats, Statistic, ZonalResult};
use crate::transport::{HttpClient, ReqwestClient};

/// Client for the WIWB API
#[derive(Clone)]
pub struct Client {
    session: Arc<Session>,
    http: Arc<dyn HttpClient>,
    base_url: String,
    reconciler: ReconcilerConfig,
}

impl Client {
    pub fn new(
        session: Arc<Session>,
        http: Arc<dyn HttpClient>,
        base_url: impl Into<String>,
        reconciler: ReconcilerConfig,
    ) -> Self {
        Self {
            session,
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            reconciler,
        }
    }

    /// Build a client with a reqwest transport from the application config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestClient::with_timeout(config.api.timeout_secs)?);
        let session = Session::new(
            config.auth.client_id.clone(),
            config.auth.client_secret.clone(),
            config.auth.token_url.clone(),
            http.clone(),
        )?;

        Ok(Self::new(
            Arc::new(session),
            http,
            config.api.base_url.clone(),
            config.reconciler()?,
        ))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Reconciler settings requests for this client are built with
    pub fn reconciler(&self) -> &ReconcilerConfig {
        &self.reconciler
    }

    /// Pair a request with this client; nothing is sent yet.
    pub fn grids(&self, request: GridRequest) -> GetGrids<'_> {
        GetGrids {
            client: self,
            request,
            response: None,
        }
    }

    /// Variable metadata for the given data sources and variables
    pub fn get_variables(
        &self,
        data_source_codes: &[String],
        variable_codes: &[String],
    ) -> Result<serde_json::Value> {
        let body = json!({
            "DataSourceCodes": data_source_codes,
            "VariableCodes": variable_codes,
        });
        let bytes = self.post("entity/variables/get", &body)?;
        let mut reply: serde_json::Value = serde_json::from_slice(&bytes)?;
        Ok(reply
            .get_mut("Variables")
            .map(serde_json::Value::take)
            .unwrap_or_default())
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> Result<Bytes> {
        let url = format!("{}/{}", self.base_url, path);
        let headers = self.session.headers()?;

        let start = Instant::now();
        let response = self.http.post_json(&url, &headers, body)?;
        let duration_ms = start.elapsed().as_millis() as u64;

        if !response.is_success() {
            warn!(url = %url, status = response.status, duration_ms, "Request rejected");
            return Err(WiwbError::RemoteService {
                status: response.status,
                body: response.text(),
            });
        }

        info!(
            url = %url,
            bytes = response.body.len(),
            duration_ms,
            "Request completed"
        );
        Ok(response.body)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// A grid request bound to a client, holding its most recent response
pub struct GetGrids<'c> {
    client: &'c Client,
    request: GridRequest,
    response: Option<Bytes>,
}

impl<'c> GetGrids<'c> {
    pub fn request(&self) -> &GridRequest {
        &self.request
    }

    /// The cached response, if the request was executed
    pub fn response(&self) -> Option<&Bytes> {
        self.response.as_ref()
    }

    /// Send the request, replacing any cached response.
    pub fn execute(&mut self) -> Result<Bytes> {
        self.response = None;
        let body = self.request.body_json()?;
        debug!(body = %body, "Executing grid request");

        let bytes = self.client.post("grids/get", &body)?;
        self.response = Some(bytes.clone());
        Ok(bytes)
    }

    /// The cached response, executing first when there is none
    pub fn content(&mut self) -> Result<Bytes> {
        match &self.response {
            Some(bytes) => Ok(bytes.clone()),
            None => self.execute(),
        }
    }

    /// Switch to another output format. The cached response belongs to the old
    /// request and is dropped.
    pub fn set_format(&mut self, format: DataFormat) {
        if self.request.data_format() != format {
            self.request = self.request.with_format(format);
            self.response = None;
        }
    }

    /// Write the payload to `directory/file_name()` and return its path.
    ///
    /// Zip payloads are extracted next to it when the request asks to unzip.
    pub fn write(&mut self, directory: &Path) -> Result<PathBuf> {
        let bytes = self.content()?;

        std::fs::create_dir_all(directory).map_err(|e| WiwbError::Resource {
            message: format!("Cannot create directory {}: {}", directory.display(), e),
        })?;

        let path = directory.join(self.request.file_name());
        std::fs::write(&path, &bytes).map_err(|e| WiwbError::Resource {
            message: format!("Cannot write {}: {}", path.display(), e),
        })?;
        info!(path = %path.display(), bytes = bytes.len(), "Wrote grid file");

        if self.request.unzip() && self.request.data_format().suffix() == "zip" {
            let file = File::open(&path)?;
            let mut archive = zip::ZipArchive::new(file)?;
            archive.extract(directory)?;
            info!(
                directory = %directory.display(),
                entries = archive.len(),
                "Extracted grid archive"
            );
        }

        Ok(path)
    }

    /// Write the payload to a temporary file, removed when the handle drops
    pub fn write_tempfile(&mut self) -> Result<NamedTempFile> {
        let bytes = self.content()?;
        let suffix = format!(".{}", self.request.data_format().suffix());

        let mut file = tempfile::Builder::new()
            .prefix("wiwb_")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| WiwbError::Resource {
                message: format!("Cannot create temporary file: {}", e),
            })?;
        file.write_all(&bytes).map_err(|e| WiwbError::Resource {
            message: format!("Cannot write temporary file: {}", e),
        })?;
        file.flush()?;
        Ok(file)
    }

    /// Sample the grid with the request's geometries.
    ///
    /// The request is switched to netCDF first, re-executing it when the format
    /// changes. The temporary grid file is removed afterwards, also on failure.
    pub fn sample(&mut self, statistics: &[Statistic]) -> Result<ZonalResult> {
        if self.request.geometries().is_none() {
            return Err(WiwbError::Sampling {
                message: "'geometries' is None, build the request with geometries first"
                    .to_string(),
            });
        }

        self.set_format(DataFormat::NetCdf);
        let temp = self.write_tempfile()?;

        let grid = load_grid(temp.path(), Some(self.request.variable_code()))?;
        let geometries = self.request.geometries().ok_or_else(|| WiwbError::Sampling {
            message: "'geometries' is None".to_string(),
        })?;
        let result = zonal_stats(&grid, geometries, statistics)?;

        info!(
            rows = result.rows(),
            columns = result.columns().len(),
            "Sampled grid"
        );
        Ok(result)
    }
}
