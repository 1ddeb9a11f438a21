//! Error types for the wiwb crate.
//!
//! Every failure the grid engine can surface is a variant of [`WiwbError`]. The core
//! never retries and never downgrades an error; callers decide what to do with it.

use thiserror::Error;

/// The main error type for wiwb operations.
#[derive(Error, Debug)]
pub enum WiwbError {
    /// Missing or contradictory parameters, missing credentials
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unsupported geometry kinds, non-positive extents, unknown codes
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The token endpoint rejected the client credentials
    #[error("Authentication failed with status {status}: {body}")]
    Auth { status: u16, body: String },

    /// An access token was issued but its expiry could not be read
    #[error("Invalid access token: {message}")]
    Token { message: String },

    /// The grid service answered with a non-success status
    #[error("Remote service error {status}: {body}")]
    RemoteService { status: u16, body: String },

    /// The request never produced an HTTP response
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Local file or directory could not be written
    #[error("Resource error: {message}")]
    Resource { message: String },

    /// Sampling was requested in a state where it is undefined
    #[error("Sampling error: {message}")]
    Sampling { message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// NetCDF file operation errors
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV output errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Zip archive errors
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// GeoJSON parsing errors
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

impl WiwbError {
    /// HTTP status the web layer answers with for this error.
    ///
    /// Remote failures pass the upstream status through when it is an error status.
    pub fn status_code(&self) -> u16 {
        match self {
            WiwbError::Configuration { .. }
            | WiwbError::Validation { .. }
            | WiwbError::Sampling { .. }
            | WiwbError::GeoJson(_) => 400,
            WiwbError::RemoteService { status, .. } if *status >= 400 => *status,
            WiwbError::Auth { .. }
            | WiwbError::Token { .. }
            | WiwbError::RemoteService { .. }
            | WiwbError::Transport { .. } => 502,
            _ => 500,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        WiwbError::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WiwbError::Validation {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results with WiwbError
pub type Result<T> = std::result::Result<T, WiwbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(WiwbError::configuration("x").status_code(), 400);
        assert_eq!(WiwbError::validation("x").status_code(), 400);
        assert_eq!(
            WiwbError::RemoteService {
                status: 404,
                body: "not found".to_string()
            }
            .status_code(),
            404
        );
        assert_eq!(
            WiwbError::Auth {
                status: 401,
                body: String::new()
            }
            .status_code(),
            502
        );
        assert_eq!(
            WiwbError::Resource {
                message: "disk full".to_string()
            }
            .status_code(),
            500
        );
    }

    #[test]
    fn test_display_carries_upstream_body() {
        let error = WiwbError::RemoteService {
            status: 500,
            body: "extent outside data source".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Remote service error 500: extent outside data source"
        );
    }
}
