//! Client side of the remote transformation service.
//!
//! The XSLT engine lives behind an HTTP API:
//! - `POST {base}/api/transform` with `{xml, xslt, version}` returns
//!   `{ok, html, engine, log}`
//! - `GET {base}/api/sample/saxon` returns `{ok, xml, xslt, message?}`
//!
//! `TransformService` is the seam the runtime talks to; `HttpTransformService`
//! is the reqwest implementation.

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// XSLT language version offered to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum XsltVersion {
    #[default]
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "3.0")]
    V3_0,
}

impl XsltVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            XsltVersion::V1_0 => "1.0",
            XsltVersion::V2_0 => "2.0",
            XsltVersion::V3_0 => "3.0",
        }
    }

    pub fn all() -> &'static [XsltVersion] {
        &[XsltVersion::V1_0, XsltVersion::V2_0, XsltVersion::V3_0]
    }
}

impl fmt::Display for XsltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XsltVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        XsltVersion::all()
            .iter()
            .copied()
            .find(|v| v.as_str() == s.trim())
            .ok_or_else(|| format!("unsupported XSLT version '{}'", s.trim()))
    }
}

/// Engine that produced (or failed to produce) a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Lxml,
    Saxon,
    Error,
    #[serde(other)]
    Unknown,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Lxml => "lxml",
            EngineKind::Saxon => "saxon",
            EngineKind::Error => "error",
            EngineKind::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformRequest {
    /// Dispatch sequence number, assigned by the scheduler.
    #[serde(skip)]
    pub seq: u64,
    pub xml: String,
    pub xslt: String,
    pub version: XsltVersion,
}

/// Wire shape of a transform response. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct TransformResponse {
    ok: bool,
    html: String,
    engine: Option<EngineKind>,
    log: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    /// True only for a 2xx response whose payload reports `ok`.
    pub ok: bool,
    pub html: String,
    /// Absent when a successful payload does not name its engine.
    pub engine: Option<EngineKind>,
    pub log: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SampleBundle {
    pub ok: bool,
    pub xml: String,
    pub xslt: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    Timeout,
    Connect,
    HttpStatus,
    Decode,
}

/// Transport-level failure talking to the service.
#[derive(Debug, Clone)]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
    pub details: Option<String>,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ServiceError {}

/// Classifies a reqwest error into a `ServiceError`.
pub fn classify_reqwest_error(e: &reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::new(ServiceErrorKind::Timeout, format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ServiceError::new(ServiceErrorKind::Connect, format!("Connection failed: {e}"))
    } else if e.is_decode() {
        ServiceError::new(ServiceErrorKind::Decode, format!("Invalid response: {e}"))
    } else if e.is_request() {
        ServiceError::new(ServiceErrorKind::HttpStatus, format!("Request error: {e}"))
    } else {
        ServiceError::new(ServiceErrorKind::HttpStatus, format!("Network error: {e}"))
    }
}

/// The remote transformation procedure.
pub trait TransformService: Send + Sync + 'static {
    fn transform(
        &self,
        request: &TransformRequest,
    ) -> impl Future<Output = Result<TransformResult, ServiceError>> + Send;

    fn fetch_sample(&self) -> impl Future<Output = Result<SampleBundle, ServiceError>> + Send;
}

/// reqwest-backed `TransformService`.
#[derive(Debug, Clone)]
pub struct HttpTransformService {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTransformService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(config.effective_service_url()?, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl TransformService for HttpTransformService {
    async fn transform(&self, request: &TransformRequest) -> Result<TransformResult, ServiceError> {
        tracing::debug!(seq = request.seq, version = %request.version, "POST /api/transform");
        let response = self
            .http
            .post(self.endpoint("/api/transform"))
            .json(request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        let payload: TransformResponse = serde_json::from_str(&body).map_err(|e| {
            ServiceError::new(
                ServiceErrorKind::Decode,
                format!("HTTP {}: response is not valid JSON ({e})", status.as_u16()),
            )
            .with_details(body.clone())
        })?;

        let ok = status.is_success() && payload.ok;
        let engine = payload.engine.or((!ok).then_some(EngineKind::Error));
        Ok(TransformResult {
            ok,
            html: payload.html,
            engine,
            log: payload.log,
        })
    }

    async fn fetch_sample(&self) -> Result<SampleBundle, ServiceError> {
        tracing::debug!("GET /api/sample/saxon");
        let response = self
            .http
            .get(self.endpoint("/api/sample/saxon"))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        let status = response.status();
        let mut bundle: SampleBundle = response
            .json()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        bundle.ok = bundle.ok && status.is_success();
        Ok(bundle)
    }
}

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<xsl:(?:stylesheet|transform)[^>]*\bversion\s*=\s*["']([^"']+)["'][^>]*>"#)
            .expect("valid xsl version regex")
    })
}

/// Reads the `version` attribute of the stylesheet root element, if present.
pub fn detect_xslt_version(xslt: &str) -> Option<String> {
    version_regex()
        .captures(xslt)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}
