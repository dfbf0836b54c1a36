// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP liveness probing

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// Errors from a liveness probe
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("invalid probe url {0}")]
    InvalidUrl(String),
    #[error("unsupported probe scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
}

/// Parse a probe target, accepting only `http` and `https`.
pub fn parse_probe_url(raw: &str) -> Result<Url, ProbeError> {
    let url = Url::parse(raw).map_err(|e| ProbeError::InvalidUrl(format!("'{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProbeError::UnsupportedScheme(other.to_string())),
    }
}

/// Issues an HTTP GET against a liveness target.
///
/// Any HTTP response counts as alive; the status code is returned for
/// logging. Callers bound the call with their own timeout.
#[async_trait]
pub trait HttpProbe: Clone + Send + Sync + 'static {
    async fn get(&self, url: &str) -> Result<u16, ProbeError>;
}

/// reqwest-backed probe
#[derive(Clone)]
pub struct ReqwestHttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestHttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ProbeError::Network(format!("failed to build http client: {}", e)))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl HttpProbe for ReqwestHttpProbe {
    async fn get(&self, url: &str) -> Result<u16, ProbeError> {
        let url = parse_probe_url(url)?;
        match self.client.get(url).send().await {
            Ok(response) => Ok(response.status().as_u16()),
            Err(e) if e.is_timeout() => Err(ProbeError::Timeout(self.timeout)),
            Err(e) => Err(ProbeError::Network(e.to_string())),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    #![cfg_attr(coverage_nightly, coverage(off))]

    use super::{parse_probe_url, HttpProbe, ProbeError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scripted outcome for a probe target
    #[derive(Debug, Clone)]
    pub enum FakeResponse {
        Status(u16),
        Fail(String),
        /// Never completes; the caller's timeout decides
        Hang,
    }

    #[derive(Default)]
    struct FakeHttpState {
        responses: HashMap<String, FakeResponse>,
        requests: Vec<String>,
    }

    /// Fake HTTP probe. Unscripted targets answer 200.
    #[derive(Clone, Default)]
    pub struct FakeHttpProbe {
        inner: Arc<Mutex<FakeHttpState>>,
    }

    impl FakeHttpProbe {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, url: &str, response: FakeResponse) {
            self.inner.lock().responses.insert(url.to_string(), response);
        }

        /// URLs probed, in order
        pub fn requests(&self) -> Vec<String> {
            self.inner.lock().requests.clone()
        }
    }

    #[async_trait]
    impl HttpProbe for FakeHttpProbe {
        async fn get(&self, url: &str) -> Result<u16, ProbeError> {
            parse_probe_url(url)?;
            let response = {
                let mut inner = self.inner.lock();
                inner.requests.push(url.to_string());
                inner
                    .responses
                    .get(url)
                    .cloned()
                    .unwrap_or(FakeResponse::Status(200))
            };
            match response {
                FakeResponse::Status(code) => Ok(code),
                FakeResponse::Fail(msg) => Err(ProbeError::Network(msg)),
                FakeResponse::Hang => std::future::pending().await,
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeHttpProbe, FakeResponse};

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
