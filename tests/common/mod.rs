//! Common test utilities for wiwb.
//!
//! This module provides shared utilities for the integration and server tests.

pub mod assertions;
pub mod http_client;
pub mod mock_http;
pub mod test_data;
