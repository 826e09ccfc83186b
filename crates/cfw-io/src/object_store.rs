//! A narrow object-storage interface for uploading Prediction Rasters
//! and Composite Rasters, and an HTTP-backed implementation matching the
//! teacher's blocking, non-tokio transport style.

use std::io::Read;

use sha2::{Digest, Sha256};

use cfw_core::{CfwError, CfwResult};

use crate::retry::with_backoff;

/// Put/get/exists over content-addressed keys. The object store itself
/// (S3, GCS, a self-hosted bucket behind a signed-URL proxy) is an
/// external system; this trait is the narrow interface the pipeline
/// talks through.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> CfwResult<String>;
    fn get(&self, key: &str) -> CfwResult<Vec<u8>>;
    fn exists(&self, key: &str) -> CfwResult<bool>;
}

/// SHA-256 of `bytes`, lowercase hex. Used both as the deterministic,
/// content-addressed object key and as the checksum recorded in a
/// `StacItem` (I4).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Uploads/downloads objects over plain HTTP PUT/GET against a base URL
/// (e.g. a signed-URL-issuing proxy in front of a bucket).
pub struct HttpObjectStore {
    base_url: String,
    agent: ureq::Agent,
    auth_token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            agent: ureq::AgentBuilder::new().build(),
            auth_token: None,
        }
    }

    /// Attaches a bearer token (the `CFW_OBJECT_STORE_TOKEN` env var) sent
    /// as `Authorization` on every request.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key.trim_start_matches('/'))
    }

    fn authed(&self, request: ureq::Request) -> ureq::Request {
        match &self.auth_token {
            Some(token) => request.set("Authorization", &format!("Bearer {token}")),
            None => request,
        }
    }
}

impl ObjectStore for HttpObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> CfwResult<String> {
        let url = self.url_for(key);
        with_backoff(&format!("object_store_put:{key}"), || {
            self.authed(self.agent.put(&url))
                .set("Content-Type", "application/octet-stream")
                .send_bytes(bytes)
                .map_err(|e| CfwError::Transport(format!("object store PUT {url} failed: {e}")))?;
            Ok(())
        })?;
        Ok(url)
    }

    fn get(&self, key: &str) -> CfwResult<Vec<u8>> {
        let url = self.url_for(key);
        with_backoff(&format!("object_store_get:{key}"), || {
            let response = self
                .authed(self.agent.get(&url))
                .call()
                .map_err(|e| CfwError::Transport(format!("object store GET {url} failed: {e}")))?;
            let mut buf = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut buf)
                .map_err(CfwError::Io)?;
            Ok(buf)
        })
    }

    fn exists(&self, key: &str) -> CfwResult<bool> {
        let url = self.url_for(key);
        match self.authed(self.agent.head(&url)).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(err) => Err(CfwError::Transport(format!("object store HEAD {url} failed: {err}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_hex_is_stable() {
        let a = sha256_hex(b"hello world");
        let b = sha256_hex(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_bytes_hash_differently() {
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
    }
}
