//! Environment configuration (spec §6): the tile/stat service base URL,
//! object-store credentials, and the STAC connection string are all
//! read from the process environment rather than threaded through
//! every CLI flag.

use std::env;

use cfw_core::{CfwError, CfwResult};

#[derive(Debug, Clone)]
pub struct CfwEnv {
    pub titiler_url: Option<String>,
    pub object_store_token: Option<String>,
    pub stac_connection_string: Option<String>,
}

impl CfwEnv {
    pub fn from_process() -> Self {
        Self {
            titiler_url: env::var("TITILER_URL").ok(),
            object_store_token: env::var("CFW_OBJECT_STORE_TOKEN").ok(),
            stac_connection_string: env::var("CFW_STAC_CONNECTION_STRING").ok(),
        }
    }

    /// The tile/stat service base URL, required for `--db-host local`.
    pub fn require_titiler_url(&self) -> CfwResult<&str> {
        self.titiler_url
            .as_deref()
            .ok_or_else(|| CfwError::Config("TITILER_URL is not set; required for --db-host local".to_string()))
    }
}
