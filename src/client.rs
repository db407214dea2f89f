//! Per-printer HTTP client for the PrusaLink status API.

use std::collections::HashMap;
use std::time::Duration;

use diqwest::WithDigestAuth;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::PrinterTarget;

/// One API resource scraped from a printer each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Version,
    Status,
    Info,
    Job,
}

impl Resource {
    /// Every resource fetched during a refresh cycle.
    pub const ALL: [Resource; 4] = [
        Resource::Version,
        Resource::Status,
        Resource::Info,
        Resource::Job,
    ];

    /// The API path for this resource.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Version => "/api/version",
            Resource::Status => "/api/v1/status",
            Resource::Info => "/api/v1/info",
            Resource::Job => "/api/v1/job",
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Version => "version",
            Resource::Status => "status",
            Resource::Info => "info",
            Resource::Job => "job",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Errors from fetching a single resource.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {path} failed: {source}")]
    Request {
        path: &'static str,
        #[source]
        source: diqwest::error::Error,
    },
    #[error("failed to read {path} response body: {source}")]
    Body {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected HTTP status {status} for {path}")]
    Status {
        path: &'static str,
        status: StatusCode,
    },
    #[error("invalid JSON body for {path}: {source}")]
    Json {
        path: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The complete result of one refresh cycle for one printer.
///
/// A snapshot is rebuilt from scratch every cycle and consumed immediately
/// by metric derivation; nothing in it survives into the next cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeSnapshot {
    host: String,
    up: bool,
    resources: HashMap<Resource, Value>,
}

impl ScrapeSnapshot {
    /// Build a snapshot from fetched resources.
    ///
    /// The printer counts as up only when every resource in
    /// [`Resource::ALL`] is present.
    pub fn from_resources(host: impl Into<String>, resources: HashMap<Resource, Value>) -> Self {
        let up = Resource::ALL.iter().all(|r| resources.contains_key(r));
        Self {
            host: host.into(),
            up,
            resources,
        }
    }

    /// A snapshot for a printer that could not be scraped this cycle.
    pub fn down(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            up: false,
            resources: HashMap::new(),
        }
    }

    /// The printer's host identifier.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether every resource was fetched successfully this cycle.
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// The parsed body of one resource, if it was fetched.
    pub fn resource(&self, resource: Resource) -> Option<&Value> {
        self.resources.get(&resource)
    }
}

/// HTTP client for a single printer.
#[derive(Clone)]
pub struct PrinterClient {
    host: String,
    username: String,
    password: String,
    http: reqwest::Client,
}

impl PrinterClient {
    /// Create a client for one printer with the given per-request timeout.
    pub fn new(target: &PrinterTarget, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            host: target.host.clone(),
            username: target.username.clone(),
            password: target.password.clone(),
            http,
        })
    }

    /// The printer's host identifier.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Fetch every resource and assemble a fresh snapshot.
    ///
    /// Never fails: any fetch error downs the printer for this cycle and the
    /// next scrape is the retry.
    pub async fn refresh(&self) -> ScrapeSnapshot {
        match self.fetch_all().await {
            Ok(resources) => {
                debug!(printer = %self.host, "refresh complete");
                ScrapeSnapshot::from_resources(&self.host, resources)
            }
            Err(e) => {
                error!(printer = %self.host, error = %e, "scrape failed, marking printer down");
                ScrapeSnapshot::down(&self.host)
            }
        }
    }

    /// Fetch all resources, stopping at the first failure.
    ///
    /// Data from a half-failed cycle is never exposed, so there is no point
    /// finishing the cycle once one resource has failed.
    async fn fetch_all(&self) -> Result<HashMap<Resource, Value>, FetchError> {
        let mut resources = HashMap::with_capacity(Resource::ALL.len());
        for resource in Resource::ALL {
            let value = self.fetch(resource).await?;
            resources.insert(resource, value);
        }
        Ok(resources)
    }

    /// Fetch and parse one resource.
    async fn fetch(&self, resource: Resource) -> Result<Value, FetchError> {
        let url = format!("http://{}{}", self.host, resource.path());

        let response = self
            .http
            .get(&url)
            .send_with_digest_auth(&self.username, &self.password)
            .await
            .map_err(|source| FetchError::Request {
                path: resource.path(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await.map_err(|source| FetchError::Body {
                    path: resource.path(),
                    source,
                })?;
                serde_json::from_str(&body).map_err(|source| FetchError::Json {
                    path: resource.path(),
                    source,
                })
            }
            // An empty page is still valid for some API calls.
            StatusCode::NO_CONTENT => Ok(Value::Object(serde_json::Map::new())),
            status => Err(FetchError::Status {
                path: resource.path(),
                status,
            }),
        }
    }
}
