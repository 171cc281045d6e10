//! # Kafka Connect Exporter
//!
//! Bridges the Kafka Connect REST status API into Prometheus. Every scrape of
//! the telemetry endpoint runs one collection cycle: for each configured
//! cluster the exporter lists the registered connectors, fetches each
//! connector's status and reports how many of its tasks are `RUNNING` and how
//! many are not.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │  SCRAPE → CONNECT COLLECTOR → STATUS SOURCE → SNAPSHOT → REGISTRY → WIRE   │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - The cluster registry is loaded once at startup and shared read-only.
//! - A cycle never keeps state between scrapes; each scrape gathers from a
//!   fresh registry holding only its own snapshot.
//! - A cluster or connector that cannot be fetched is logged and left out of
//!   that scrape. It never takes the process down.

// ============================================================================
// SECTION 1: IMPORTS & DEPENDENCIES
// ============================================================================

// ----------------------------------------------------------------------------
// Standard Library Imports
// ----------------------------------------------------------------------------
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};
use std::fs;
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ----------------------------------------------------------------------------
// Async Runtime - Tokio
// ----------------------------------------------------------------------------
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant as TokioInstant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

// ----------------------------------------------------------------------------
// Serialization
// ----------------------------------------------------------------------------
use serde::{de::DeserializeOwned, Deserialize};

// ----------------------------------------------------------------------------
// Error Handling
// ----------------------------------------------------------------------------
use anyhow::{Context as AnyhowContext, Result as AnyhowResult};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Logging & Tracing
// ----------------------------------------------------------------------------
use tracing::{debug, info, warn};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ----------------------------------------------------------------------------
// Networking
// ----------------------------------------------------------------------------
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reqwest::{Client as HttpClient, Url};
use tower_http::trace::TraceLayer;

// ----------------------------------------------------------------------------
// CLI
// ----------------------------------------------------------------------------
use clap::{Parser, Subcommand, ValueEnum};

// ----------------------------------------------------------------------------
// Prometheus
// ----------------------------------------------------------------------------
use prometheus::core::{Collector as PrometheusCollector, Desc};
use prometheus::proto::{Gauge, LabelPair, Metric as ProtoMetric, MetricFamily, MetricType};
use prometheus::{Encoder, ProtobufEncoder, Registry as PrometheusRegistry, TextEncoder};

// ============================================================================
// SECTION 2: CONSTANTS & VERSION INFORMATION
// ============================================================================

/// Exporter version - follows semantic versioning
pub const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const EXPORTER_NAME: &str = "kafka-connect-exporter";
pub const EXPORTER_FULL_NAME: &str = "Kafka connect exporter";

// ----------------------------------------------------------------------------
// Process Defaults
// ----------------------------------------------------------------------------

/// Default listen address. A leading `:` means every IPv4 interface.
pub const DEFAULT_LISTEN_ADDRESS: &str = ":9121";

/// Default path under which metrics are exposed
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default location of the cluster registry file
pub const DEFAULT_CONFIG_PATH: &str = "./config";

/// Default timeout for a single outbound request
pub const DEFAULT_HTTP_TIMEOUT: &str = "10s";

/// Default deadline for one whole collection cycle
pub const DEFAULT_SCRAPE_TIMEOUT: &str = "30s";

/// Default bound on in-flight outbound requests per cycle
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Upper bound accepted for `--http.max-concurrency`
pub const MAX_CONCURRENCY_LIMIT: usize = 256;

/// Idle pooled connections kept per Connect worker
pub const IDLE_CONNECTIONS_PER_HOST: usize = 4;

// ----------------------------------------------------------------------------
// Metric Schema
// ----------------------------------------------------------------------------

pub const RUNNING_TASK_METRIC: &str = "kafka_connect_running_task";
pub const RUNNING_TASK_HELP: &str = "Number of running task";
pub const FAILING_TASK_METRIC: &str = "kafka_connect_failing_task";
pub const FAILING_TASK_HELP: &str = "Number of failing task";

pub const CLUSTER_LABEL: &str = "cluster";
pub const TASK_LABEL: &str = "task";

/// The only task state counted as healthy
pub const RUNNING_STATE: &str = "RUNNING";

// ----------------------------------------------------------------------------
// Exposition
// ----------------------------------------------------------------------------

const PROTOBUF_MEDIA_TYPE: &str = "application/vnd.google.protobuf";
const DELIMITED_ENCODING: &str = "encoding=delimited";

// ============================================================================
// SECTION 3: CORE TYPE SYSTEM
// ============================================================================

// ----------------------------------------------------------------------------
// 3.1 Cluster Registry
// ----------------------------------------------------------------------------

/// Immutable mapping from cluster name to its Connect REST endpoint
/// (`host:port`, no scheme).
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ClusterRegistry {
    clusters: BTreeMap<String, String>,
}

impl ClusterRegistry {
    /// Build a registry from an existing map, validating every entry.
    pub fn new(clusters: BTreeMap<String, String>) -> ConfigResult<Self> {
        let registry = Self { clusters };
        registry.validate()?;
        Ok(registry)
    }

    /// Build a registry from `(name, endpoint)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, endpoint)| (name.into(), endpoint.into()))
                .collect(),
        )
    }

    /// Load the registry from a JSON file mapping cluster name to endpoint.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json_str(&contents)
    }

    /// Parse from a JSON string (also used by tests).
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let clusters: BTreeMap<String, String> =
            serde_json::from_str(json).map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })?;
        Self::new(clusters)
    }

    /// Validate every cluster name and endpoint.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, endpoint) in &self.clusters {
            if name.trim().is_empty() {
                return Err(ConfigError::invalid_value(
                    "cluster name",
                    "cluster names must not be empty",
                ));
            }
            validate_endpoint(name, endpoint)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Endpoint registered for `cluster`, if any.
    pub fn endpoint(&self, cluster: &str) -> Option<&str> {
        self.clusters.get(cluster).map(String::as_str)
    }

    /// Iterate `(cluster, endpoint)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.clusters
            .iter()
            .map(|(name, endpoint)| (name.as_str(), endpoint.as_str()))
    }
}

fn validate_endpoint(cluster: &str, endpoint: &str) -> ConfigResult<()> {
    let invalid = |message: &str| ConfigError::InvalidEndpoint {
        cluster: cluster.to_string(),
        endpoint: endpoint.to_string(),
        message: message.to_string(),
    };

    if endpoint.is_empty() {
        return Err(invalid("endpoint is empty"));
    }
    if endpoint.contains("://") {
        return Err(invalid("expected host:port without a scheme"));
    }
    if endpoint.contains('/') {
        return Err(invalid("expected host:port without a path"));
    }
    if endpoint.chars().any(char::is_whitespace) {
        return Err(invalid("endpoint must not contain whitespace"));
    }
    Url::parse(&format!("http://{}/", endpoint)).map_err(|e| invalid(&e.to_string()))?;
    Ok(())
}

// ----------------------------------------------------------------------------
// 3.2 Connect REST Payloads
// ----------------------------------------------------------------------------

/// A single task entry from `GET /connectors/{name}/status`.
///
/// Only the state matters here. A missing or `null` state decodes to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskRecord {
    #[serde(default)]
    pub state: Option<String>,
}

impl TaskRecord {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: Some(state.into()),
        }
    }

    pub fn health(&self) -> TaskHealth {
        TaskHealth::classify(self.state.as_deref())
    }
}

/// Body of `GET /connectors/{name}/status`. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectorStatus {
    pub name: String,
    pub tasks: Vec<TaskRecord>,
}

// ----------------------------------------------------------------------------
// 3.3 Task Classification
// ----------------------------------------------------------------------------

/// Binary health bucket for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskHealth {
    Running,
    /// Anything that is not exactly `RUNNING`, including unknown states.
    Failing,
}

impl TaskHealth {
    pub fn classify(state: Option<&str>) -> Self {
        match state {
            Some(RUNNING_STATE) => TaskHealth::Running,
            _ => TaskHealth::Failing,
        }
    }
}

impl Display for TaskHealth {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TaskHealth::Running => write!(f, "running"),
            TaskHealth::Failing => write!(f, "failing"),
        }
    }
}

/// Running and failing task counts for one connector in one cycle.
///
/// `running + failing` always equals the number of tasks tallied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskCounts {
    pub running: u64,
    pub failing: u64,
}

impl TaskCounts {
    pub fn tally<'a, I>(tasks: I) -> Self
    where
        I: IntoIterator<Item = &'a TaskRecord>,
    {
        let mut counts = Self::default();
        for task in tasks {
            counts.record(task.health());
        }
        counts
    }

    pub fn record(&mut self, health: TaskHealth) {
        match health {
            TaskHealth::Running => self.running += 1,
            TaskHealth::Failing => self.failing += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.running + self.failing
    }
}

/// Aggregated health of one connector on one cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorHealth {
    pub cluster: String,
    pub connector: String,
    pub counts: TaskCounts,
}

impl ConnectorHealth {
    pub fn new(cluster: impl Into<String>, connector: impl Into<String>, counts: TaskCounts) -> Self {
        Self {
            cluster: cluster.into(),
            connector: connector.into(),
            counts,
        }
    }
}

// ============================================================================
// SECTION 4: ERROR HANDLING FRAMEWORK
// ============================================================================

// ----------------------------------------------------------------------------
// 4.1 Core Exporter Errors
// ----------------------------------------------------------------------------

/// The main error type for the exporter.
#[derive(Error, Debug)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExporterError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ExporterError::Config(_) => "config",
            ExporterError::Fetch(e) => e.category(),
            ExporterError::Server(_) => "server",
            ExporterError::Io(_) => "io",
            ExporterError::Internal(_) => "internal",
        }
    }
}

// ----------------------------------------------------------------------------
// 4.2 Configuration Errors
// ----------------------------------------------------------------------------

/// Errors raised while loading or validating configuration. All of them are
/// fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to read configuration file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {message}")]
    ParseError { message: String },

    #[error("Invalid endpoint '{endpoint}' for cluster '{cluster}': {message}")]
    InvalidEndpoint {
        cluster: String,
        endpoint: String,
        message: String,
    },

    #[error("Invalid configuration value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// 4.3 Fetch Errors
// ----------------------------------------------------------------------------

/// Failures talking to a Connect REST endpoint. Every variant is recoverable:
/// the collector skips the affected cluster or connector for one cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL for endpoint '{endpoint}': {message}")]
    InvalidUrl { endpoint: String, message: String },

    #[error("Request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },
}

impl FetchError {
    fn from_request(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: error,
            }
        }
    }

    /// The endpoint could not be reached or answered with an error status.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            FetchError::Network { .. } | FetchError::Timeout { .. } | FetchError::HttpStatus { .. }
        )
    }

    /// The endpoint answered but the body was not the expected JSON shape.
    pub fn is_malformed(&self) -> bool {
        matches!(self, FetchError::MalformedResponse { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => "invalid_url",
            FetchError::Network { .. } => "network",
            FetchError::Timeout { .. } => "timeout",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::MalformedResponse { .. } => "malformed_response",
        }
    }
}

// ----------------------------------------------------------------------------
// 4.4 Server Errors
// ----------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Failed to encode metrics: {message}")]
    Encode { message: String },
}

// ----------------------------------------------------------------------------
// 4.5 Result Type Aliases
// ----------------------------------------------------------------------------

pub type ExporterResult<T> = Result<T, ExporterError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type FetchResult<T> = Result<T, FetchError>;

// ============================================================================
// SECTION 5: CONFIGURATION SYSTEM
// ============================================================================

// ----------------------------------------------------------------------------
// 5.1 Main Configuration Structure
// ----------------------------------------------------------------------------

/// Fully resolved process configuration.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub listen_address: SocketAddr,
    pub metrics_path: String,
    pub config_file: PathBuf,
    pub collection: CollectionSettings,
    pub logging: LoggingConfig,
}

// ----------------------------------------------------------------------------
// 5.2 Collection Settings
// ----------------------------------------------------------------------------

/// Limits applied to every collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSettings {
    /// Timeout for each outbound request
    pub request_timeout: Duration,
    /// Deadline for a whole cycle; clusters still running are dropped
    pub scrape_timeout: Duration,
    /// Maximum in-flight outbound requests per cycle (1 = sequential)
    pub max_concurrency: usize,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            scrape_timeout: Duration::from_secs(30),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl CollectionSettings {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "http.timeout",
                "timeout must be greater than zero",
            ));
        }
        if self.scrape_timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "scrape.timeout",
                "timeout must be greater than zero",
            ));
        }
        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(ConfigError::invalid_value(
                "http.max-concurrency",
                format!("must be between 1 and {}", MAX_CONCURRENCY_LIMIT),
            ));
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// 5.3 Logging Configuration
// ----------------------------------------------------------------------------

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

// ----------------------------------------------------------------------------
// 5.4 Address & Path Helpers
// ----------------------------------------------------------------------------

/// Resolve a listen address. A bare `:port` binds every IPv4 interface
/// (`0.0.0.0:port`); pass `[::]:port` to listen on IPv6.
pub fn parse_listen_address(address: &str) -> ConfigResult<SocketAddr> {
    let normalized = if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_string()
    };

    normalized
        .to_socket_addrs()
        .map_err(|e| ConfigError::invalid_value("web.listen-address", e.to_string()))?
        .next()
        .ok_or_else(|| {
            ConfigError::invalid_value("web.listen-address", format!("'{}' did not resolve", address))
        })
}

/// The telemetry path must be absolute and must not shadow the landing page.
pub fn validate_metrics_path(path: &str) -> ConfigResult<()> {
    if !path.starts_with('/') {
        return Err(ConfigError::invalid_value(
            "web.telemetry-path",
            "path must start with '/'",
        ));
    }
    if path == "/" {
        return Err(ConfigError::invalid_value(
            "web.telemetry-path",
            "'/' is reserved for the landing page",
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION 6: LOGGING & TRACING INFRASTRUCTURE
// ============================================================================

/// Initialize the logging system. `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &LoggingConfig) -> ExporterResult<()> {
    let level_filter = match config.level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let installed = match config.format {
        LogFormat::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Compact => subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_target(true))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };
    installed.map_err(|e| ExporterError::Internal(format!("Failed to set logger: {}", e)))?;

    info!(
        target: "kafka_connect_exporter::init",
        level = %config.level,
        format = %config.format,
        "Logging initialized"
    );

    Ok(())
}

// ============================================================================
// SECTION 7: STATUS FETCHER
// ============================================================================
// Two-stage interaction with one Connect cluster: list the connectors, then
// fetch each connector's status. Failures are returned, never logged or
// retried here.
// ============================================================================

// ----------------------------------------------------------------------------
// 7.1 Status Source Trait
// ----------------------------------------------------------------------------

/// Source of connector listings and statuses for a Connect endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// `GET http://{endpoint}/connectors`
    async fn list_connectors(&self, endpoint: &str) -> FetchResult<Vec<String>>;

    /// `GET http://{endpoint}/connectors/{connector}/status`
    async fn fetch_status(&self, endpoint: &str, connector: &str) -> FetchResult<ConnectorStatus>;
}

// ----------------------------------------------------------------------------
// 7.2 REST Fetcher
// ----------------------------------------------------------------------------

/// `StatusSource` backed by the Connect REST API over plain HTTP.
#[derive(Debug, Clone)]
pub struct RestStatusFetcher {
    client: HttpClient,
}

impl RestStatusFetcher {
    /// Create a fetcher whose requests each time out after `request_timeout`.
    pub fn new(request_timeout: Duration) -> ExporterResult<Self> {
        let client = HttpClient::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(IDLE_CONNECTIONS_PER_HOST)
            .user_agent(format!("{}/{}", EXPORTER_NAME, EXPORTER_VERSION))
            .build()
            .map_err(|e| ExporterError::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn connectors_url(endpoint: &str) -> FetchResult<Url> {
        endpoint_url(endpoint, &["connectors"])
    }

    /// Connector names are escaped as a single path segment.
    pub fn status_url(endpoint: &str, connector: &str) -> FetchResult<Url> {
        endpoint_url(endpoint, &["connectors", connector, "status"])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> FetchResult<T> {
        let url_text = url.to_string();
        debug!(target: "kafka_connect_exporter::fetcher", url = %url_text, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_request(&url_text, e))?;
        let status = response.status();

        // Drain the body on every path so the connection goes back to the pool.
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_request(&url_text, e))?;

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url_text,
                status: status.as_u16(),
            });
        }

        serde_json::from_slice(&body).map_err(|e| FetchError::MalformedResponse {
            url: url_text,
            message: e.to_string(),
        })
    }
}

fn endpoint_url(endpoint: &str, segments: &[&str]) -> FetchResult<Url> {
    let invalid = |message: String| FetchError::InvalidUrl {
        endpoint: endpoint.to_string(),
        message,
    };

    let mut url = Url::parse(&format!("http://{}/", endpoint)).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("endpoint cannot be used as a base URL".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl StatusSource for RestStatusFetcher {
    async fn list_connectors(&self, endpoint: &str) -> FetchResult<Vec<String>> {
        let url = Self::connectors_url(endpoint)?;
        self.get_json(url).await
    }

    async fn fetch_status(&self, endpoint: &str, connector: &str) -> FetchResult<ConnectorStatus> {
        let url = Self::status_url(endpoint, connector)?;
        self.get_json(url).await
    }
}

// ============================================================================
// SECTION 8: CONNECT COLLECTOR
// ============================================================================
// Drives the fetcher for every registered cluster and reduces task states to
// per-connector counts. Stateless between cycles: each call starts from an
// empty report and owns its own concurrency permits.
// ============================================================================

// ----------------------------------------------------------------------------
// 8.1 Collection Report
// ----------------------------------------------------------------------------

/// Where in the cycle a cluster or connector was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureStage {
    ListConnectors,
    FetchStatus,
    Deadline,
}

impl Display for FailureStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::ListConnectors => write!(f, "list_connectors"),
            FailureStage::FetchStatus => write!(f, "fetch_status"),
            FailureStage::Deadline => write!(f, "deadline"),
        }
    }
}

/// A cluster (or one of its connectors) omitted from a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFailure {
    pub cluster: String,
    pub connector: Option<String>,
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of one collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub connectors: Vec<ConnectorHealth>,
    pub failures: Vec<CollectionFailure>,
}

impl CollectionReport {
    fn failed(failure: CollectionFailure) -> Self {
        Self {
            connectors: Vec::new(),
            failures: vec![failure],
        }
    }

    fn merge(&mut self, other: CollectionReport) {
        self.connectors.extend(other.connectors);
        self.failures.extend(other.failures);
    }

    fn sort(&mut self) {
        self.connectors
            .sort_by(|a, b| (&a.cluster, &a.connector).cmp(&(&b.cluster, &b.connector)));
        self.failures
            .sort_by(|a, b| (&a.cluster, &a.connector).cmp(&(&b.cluster, &b.connector)));
    }

    /// True when nothing was skipped.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn get(&self, cluster: &str, connector: &str) -> Option<&ConnectorHealth> {
        self.connectors
            .iter()
            .find(|row| row.cluster == cluster && row.connector == connector)
    }

    pub fn for_cluster<'a>(&'a self, cluster: &'a str) -> impl Iterator<Item = &'a ConnectorHealth> + 'a {
        self.connectors.iter().filter(move |row| row.cluster == cluster)
    }
}

// ----------------------------------------------------------------------------
// 8.2 Collector
// ----------------------------------------------------------------------------

/// Runs collection cycles over a fixed cluster registry.
pub struct ConnectCollector<S> {
    registry: Arc<ClusterRegistry>,
    source: S,
    settings: CollectionSettings,
}

impl<S: StatusSource> ConnectCollector<S> {
    pub fn new(registry: Arc<ClusterRegistry>, source: S, settings: CollectionSettings) -> Self {
        Self {
            registry,
            source,
            settings,
        }
    }

    pub fn registry(&self) -> &ClusterRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    /// Run one cycle bounded by the configured scrape timeout.
    pub async fn collect(&self) -> CollectionReport {
        let deadline = TokioInstant::now() + self.settings.scrape_timeout;
        self.collect_until(deadline).await
    }

    /// Run one cycle. Clusters that have not finished by `deadline` are
    /// reported as failures and contribute no samples.
    pub async fn collect_until(&self, deadline: TokioInstant) -> CollectionReport {
        let started = Instant::now();
        let concurrency = self.settings.max_concurrency.max(1);
        let permits = Semaphore::new(concurrency);
        let targets: Vec<(String, String)> = self
            .registry
            .iter()
            .map(|(cluster, endpoint)| (cluster.to_string(), endpoint.to_string()))
            .collect();

        let cluster_reports: Vec<CollectionReport> = stream::iter(targets)
            .map(|(cluster, endpoint)| self.collect_cluster_until(cluster, endpoint, deadline, &permits))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = CollectionReport::default();
        for cluster_report in cluster_reports {
            report.merge(cluster_report);
        }
        report.sort();

        debug!(
            target: "kafka_connect_exporter::collector",
            clusters = self.registry.len(),
            connectors = report.connectors.len(),
            failures = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection cycle complete"
        );

        report
    }

    async fn collect_cluster_until(
        &self,
        cluster: String,
        endpoint: String,
        deadline: TokioInstant,
        permits: &Semaphore,
    ) -> CollectionReport {
        match timeout_at(deadline, self.collect_cluster(&cluster, &endpoint, permits)).await {
            Ok(report) => report,
            Err(_) => {
                warn!(
                    target: "kafka_connect_exporter::collector",
                    cluster = %cluster,
                    endpoint = %endpoint,
                    scrape_timeout_ms = self.settings.scrape_timeout.as_millis() as u64,
                    "Skipping cluster: scrape deadline exceeded"
                );
                CollectionReport::failed(CollectionFailure {
                    cluster,
                    connector: None,
                    stage: FailureStage::Deadline,
                    message: "scrape deadline exceeded".to_string(),
                })
            }
        }
    }

    async fn collect_cluster(&self, cluster: &str, endpoint: &str, permits: &Semaphore) -> CollectionReport {
        let connectors = match with_permit(permits, self.source.list_connectors(endpoint)).await {
            Ok(connectors) => connectors,
            Err(err) => {
                warn!(
                    target: "kafka_connect_exporter::collector",
                    cluster,
                    endpoint,
                    error = %err,
                    category = err.category(),
                    "Skipping cluster: cannot list connectors"
                );
                return CollectionReport::failed(CollectionFailure {
                    cluster: cluster.to_string(),
                    connector: None,
                    stage: FailureStage::ListConnectors,
                    message: err.to_string(),
                });
            }
        };

        // A connector listed twice would yield duplicate series.
        let connectors: BTreeSet<String> = connectors.into_iter().collect();

        let outcomes: Vec<Result<ConnectorHealth, CollectionFailure>> = stream::iter(connectors)
            .map(|connector| self.collect_connector(cluster, endpoint, connector, permits))
            .buffer_unordered(self.settings.max_concurrency.max(1))
            .collect()
            .await;

        let mut report = CollectionReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(health) => report.connectors.push(health),
                Err(failure) => report.failures.push(failure),
            }
        }
        report
    }

    async fn collect_connector(
        &self,
        cluster: &str,
        endpoint: &str,
        connector: String,
        permits: &Semaphore,
    ) -> Result<ConnectorHealth, CollectionFailure> {
        match with_permit(permits, self.source.fetch_status(endpoint, &connector)).await {
            Ok(status) => {
                if status.name != connector {
                    debug!(
                        target: "kafka_connect_exporter::collector",
                        cluster,
                        connector = %connector,
                        reported = %status.name,
                        "Status name differs from listed connector name"
                    );
                }
                let counts = TaskCounts::tally(&status.tasks);
                Ok(ConnectorHealth::new(cluster, connector, counts))
            }
            Err(err) => {
                warn!(
                    target: "kafka_connect_exporter::collector",
                    cluster,
                    endpoint,
                    connector = %connector,
                    error = %err,
                    category = err.category(),
                    "Skipping connector: cannot fetch status"
                );
                Err(CollectionFailure {
                    cluster: cluster.to_string(),
                    connector: Some(connector),
                    stage: FailureStage::FetchStatus,
                    message: err.to_string(),
                })
            }
        }
    }
}

async fn with_permit<F: Future>(permits: &Semaphore, call: F) -> F::Output {
    // The semaphore is never closed, so acquire only fails if that changes.
    let _permit = permits.acquire().await.ok();
    call.await
}

// ============================================================================
// SECTION 9: PROMETHEUS EXPOSITION
// ============================================================================

// ----------------------------------------------------------------------------
// 9.1 Metric Schema
// ----------------------------------------------------------------------------

/// Static description of the exported gauges, built once at startup.
#[derive(Debug, Clone)]
pub struct MetricSchema {
    running: Desc,
    failing: Desc,
}

impl MetricSchema {
    pub fn new() -> ExporterResult<Self> {
        Ok(Self {
            running: task_desc(RUNNING_TASK_METRIC, RUNNING_TASK_HELP)?,
            failing: task_desc(FAILING_TASK_METRIC, FAILING_TASK_HELP)?,
        })
    }

    pub fn descs(&self) -> Vec<&Desc> {
        vec![&self.running, &self.failing]
    }
}

fn task_desc(name: &str, help: &str) -> ExporterResult<Desc> {
    Desc::new(
        name.to_string(),
        help.to_string(),
        vec![CLUSTER_LABEL.to_string(), TASK_LABEL.to_string()],
        HashMap::new(),
    )
    .map_err(|e| ExporterError::Internal(format!("Invalid metric descriptor '{}': {}", name, e)))
}

// ----------------------------------------------------------------------------
// 9.2 Scrape Snapshot Collector
// ----------------------------------------------------------------------------

/// The rows of one cycle, exposed through the Prometheus collector interface.
pub struct ScrapeSnapshot {
    schema: Arc<MetricSchema>,
    rows: Vec<ConnectorHealth>,
}

impl ScrapeSnapshot {
    pub fn new(schema: Arc<MetricSchema>, rows: Vec<ConnectorHealth>) -> Self {
        Self { schema, rows }
    }

    fn gauge_family(&self, name: &str, help: &str, value: fn(&TaskCounts) -> u64) -> MetricFamily {
        let metrics: Vec<ProtoMetric> = self
            .rows
            .iter()
            .map(|row| {
                let mut gauge = Gauge::default();
                gauge.set_value(value(&row.counts) as f64);

                let mut metric = ProtoMetric::default();
                metric.set_label(
                    vec![
                        label_pair(CLUSTER_LABEL, &row.cluster),
                        label_pair(TASK_LABEL, &row.connector),
                    ]
                    .into(),
                );
                metric.set_gauge(gauge);
                metric
            })
            .collect();

        let mut family = MetricFamily::default();
        family.set_name(name.to_string());
        family.set_help(help.to_string());
        family.set_field_type(MetricType::GAUGE);
        family.set_metric(metrics.into());
        family
    }
}

fn label_pair(name: &str, value: &str) -> LabelPair {
    let mut pair = LabelPair::default();
    pair.set_name(name.to_string());
    pair.set_value(value.to_string());
    pair
}

impl PrometheusCollector for ScrapeSnapshot {
    fn desc(&self) -> Vec<&Desc> {
        self.schema.descs()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![
            self.gauge_family(RUNNING_TASK_METRIC, RUNNING_TASK_HELP, |c| c.running),
            self.gauge_family(FAILING_TASK_METRIC, FAILING_TASK_HELP, |c| c.failing),
        ]
    }
}

// ----------------------------------------------------------------------------
// 9.3 Encoding
// ----------------------------------------------------------------------------

/// Encoded scrape body with its content type.
#[derive(Debug, Clone)]
pub struct EncodedMetrics {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Gather a cycle's rows through a registry that holds nothing else.
pub fn gather_snapshot(schema: &Arc<MetricSchema>, rows: Vec<ConnectorHealth>) -> ExporterResult<Vec<MetricFamily>> {
    let registry = PrometheusRegistry::new();
    registry
        .register(Box::new(ScrapeSnapshot::new(schema.clone(), rows)))
        .map_err(|e| ServerError::Encode {
            message: e.to_string(),
        })?;
    Ok(registry.gather())
}

/// Gather and encode, honouring a protobuf `Accept` header.
pub fn render_metrics(
    schema: &Arc<MetricSchema>,
    rows: Vec<ConnectorHealth>,
    accept: Option<&str>,
) -> ExporterResult<EncodedMetrics> {
    let families = gather_snapshot(schema, rows)?;
    let mut body = Vec::new();

    let content_type = if accepts_protobuf(accept) {
        let encoder = ProtobufEncoder::new();
        encoder.encode(&families, &mut body).map_err(|e| ServerError::Encode {
            message: e.to_string(),
        })?;
        encoder.format_type().to_string()
    } else {
        let encoder = TextEncoder::new();
        encoder.encode(&families, &mut body).map_err(|e| ServerError::Encode {
            message: e.to_string(),
        })?;
        encoder.format_type().to_string()
    };

    Ok(EncodedMetrics { content_type, body })
}

fn accepts_protobuf(accept: Option<&str>) -> bool {
    accept.map_or(false, |value| {
        value.split(',').any(|media| {
            let media = media.trim();
            media.starts_with(PROTOBUF_MEDIA_TYPE) && media.contains(DELIMITED_ENCODING)
        })
    })
}

// ============================================================================
// SECTION 10: HTTP SERVER
// ============================================================================

// ----------------------------------------------------------------------------
// 10.1 Application State
// ----------------------------------------------------------------------------

/// Shared state handed to every request.
pub struct AppState<S> {
    collector: Arc<ConnectCollector<S>>,
    schema: Arc<MetricSchema>,
    metrics_path: Arc<str>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            collector: self.collector.clone(),
            schema: self.schema.clone(),
            metrics_path: self.metrics_path.clone(),
        }
    }
}

impl<S: StatusSource> AppState<S> {
    pub fn new(collector: ConnectCollector<S>, schema: MetricSchema, metrics_path: &str) -> Self {
        Self {
            collector: Arc::new(collector),
            schema: Arc::new(schema),
            metrics_path: Arc::from(metrics_path),
        }
    }
}

// ----------------------------------------------------------------------------
// 10.2 Router & Handlers
// ----------------------------------------------------------------------------

/// Build the exporter router: landing page on `/`, metrics on the
/// configured path.
pub fn build_router<S: StatusSource + 'static>(state: AppState<S>) -> Router {
    let metrics_path = state.metrics_path.to_string();
    Router::new()
        .route("/", get(landing_page::<S>))
        .route(&metrics_path, get(metrics_handler::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn landing_page<S: StatusSource + 'static>(State(state): State<AppState<S>>) -> Html<String> {
    Html(landing_html(&state.metrics_path))
}

fn landing_html(metrics_path: &str) -> String {
    format!(
        "<html>\n\
         <head><title>{title}</title></head>\n\
         <body>\n\
         <h1>{title}</h1>\n\
         <p><a href='{path}'>Metrics</a></p>\n\
         </body>\n\
         </html>",
        title = EXPORTER_FULL_NAME,
        path = metrics_path,
    )
}

async fn metrics_handler<S: StatusSource + 'static>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
) -> Response {
    let started = Instant::now();
    let report = state.collector.collect().await;
    let skipped = report.failures.len();
    let connectors = report.connectors.len();
    let accept = headers.get(header::ACCEPT).and_then(|value| value.to_str().ok());

    match render_metrics(&state.schema, report.connectors, accept) {
        Ok(encoded) => {
            debug!(
                target: "kafka_connect_exporter::server",
                connectors,
                skipped,
                bytes = encoded.body.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Scrape served"
            );
            ([(header::CONTENT_TYPE, encoded.content_type)], encoded.body).into_response()
        }
        Err(err) => {
            warn!(
                target: "kafka_connect_exporter::server",
                error = %err,
                category = err.category(),
                "Failed to render metrics"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

// ----------------------------------------------------------------------------
// 10.3 Serve
// ----------------------------------------------------------------------------

/// Bind the listener and serve until SIGINT/SIGTERM.
pub async fn serve(config: &ExporterConfig, registry: ClusterRegistry) -> ExporterResult<()> {
    let fetcher = RestStatusFetcher::new(config.collection.request_timeout)?;
    let collector = ConnectCollector::new(Arc::new(registry), fetcher, config.collection);
    let state = AppState::new(collector, MetricSchema::new()?, &config.metrics_path);
    let app = build_router(state);

    let listener = TcpListener::bind(config.listen_address)
        .await
        .map_err(|source| ServerError::Bind {
            address: config.listen_address.to_string(),
            source,
        })?;

    info!(
        target: "kafka_connect_exporter::server",
        address = %config.listen_address,
        path = %config.metrics_path,
        "Providing metrics at {}{}",
        config.listen_address,
        config.metrics_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    info!(target: "kafka_connect_exporter::server", "Exporter stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}

// ============================================================================
// SECTION 11: CLI & COMMAND LINE INTERFACE
// ============================================================================

// ----------------------------------------------------------------------------
// 11.1 CLI Argument Parser
// ----------------------------------------------------------------------------

/// Kafka Connect exporter CLI
#[derive(Parser, Debug)]
#[command(
    name = "kafka-connect-exporter",
    author = "AIOps Team",
    version,
    about = "Prometheus exporter for Kafka Connect task health",
    long_about = "Polls the REST status API of one or more Kafka Connect clusters on every \
                  scrape and exposes the number of running and failing tasks per connector."
)]
pub struct Cli {
    /// Address to listen on for web interface and telemetry (`:port` = all IPv4 interfaces)
    #[arg(
        long = "web.listen-address",
        default_value = DEFAULT_LISTEN_ADDRESS,
        env = "KAFKA_CONNECT_EXPORTER_LISTEN_ADDRESS"
    )]
    pub listen_address: String,

    /// Path under which to expose metrics
    #[arg(
        long = "web.telemetry-path",
        default_value = DEFAULT_METRICS_PATH,
        env = "KAFKA_CONNECT_EXPORTER_TELEMETRY_PATH"
    )]
    pub metrics_path: String,

    /// Cluster registry file (JSON object of cluster name to host:port)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "KAFKA_CONNECT_EXPORTER_CONFIG")]
    pub config: PathBuf,

    /// Timeout for each request to a Connect cluster
    #[arg(
        long = "http.timeout",
        default_value = DEFAULT_HTTP_TIMEOUT,
        value_parser = humantime::parse_duration,
        env = "KAFKA_CONNECT_EXPORTER_HTTP_TIMEOUT"
    )]
    pub http_timeout: Duration,

    /// Deadline for one full collection cycle
    #[arg(
        long = "scrape.timeout",
        default_value = DEFAULT_SCRAPE_TIMEOUT,
        value_parser = humantime::parse_duration,
        env = "KAFKA_CONNECT_EXPORTER_SCRAPE_TIMEOUT"
    )]
    pub scrape_timeout: Duration,

    /// Maximum concurrent requests per scrape (1 = sequential)
    #[arg(
        long = "http.max-concurrency",
        default_value_t = DEFAULT_MAX_CONCURRENCY,
        env = "KAFKA_CONNECT_EXPORTER_MAX_CONCURRENCY"
    )]
    pub max_concurrency: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log.level", default_value = "info", env = "KAFKA_CONNECT_EXPORTER_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format
    #[arg(
        long = "log.format",
        value_enum,
        default_value_t = LogFormat::Pretty,
        env = "KAFKA_CONNECT_EXPORTER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the exporter (default)
    Run,

    /// Validate the cluster registry file
    Validate {
        /// Print every registered cluster
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show version and build info
    Version,
}

impl Cli {
    /// Resolve flags into a validated process configuration.
    pub fn to_config(&self) -> ConfigResult<ExporterConfig> {
        let listen_address = parse_listen_address(&self.listen_address)?;
        validate_metrics_path(&self.metrics_path)?;

        let collection = CollectionSettings {
            request_timeout: self.http_timeout,
            scrape_timeout: self.scrape_timeout,
            max_concurrency: self.max_concurrency,
        };
        collection.validate()?;

        Ok(ExporterConfig {
            listen_address,
            metrics_path: self.metrics_path.clone(),
            config_file: self.config.clone(),
            collection,
            logging: LoggingConfig {
                level: self.log_level.clone(),
                format: self.log_format,
            },
        })
    }
}

// ----------------------------------------------------------------------------
// 11.2 CLI Handler Functions
// ----------------------------------------------------------------------------

/// Handle the validate subcommand
fn handle_validate(config_path: &Path, verbose: bool) -> ExporterResult<()> {
    println!("Validating cluster registry: {}", config_path.display());

    match ClusterRegistry::load(config_path) {
        Ok(registry) => {
            println!("✅ Cluster registry is valid!");
            println!("  • Clusters defined: {}", registry.len());
            if registry.is_empty() {
                println!("  ⚠️  No clusters configured; scrapes will be empty");
            }
            if verbose {
                for (cluster, endpoint) in registry.iter() {
                    println!("    - {} → http://{}", cluster, endpoint);
                }
            }
            Ok(())
        }
        Err(e) => {
            println!("❌ Cluster registry validation failed!");
            println!("Error: {}", e);
            Err(ExporterError::Config(e))
        }
    }
}

/// Handle the version subcommand
fn handle_version() {
    println!("{} v{}", EXPORTER_FULL_NAME, EXPORTER_VERSION);
    println!();
    println!("Build Information:");
    println!("  • Arch: {}", std::env::consts::ARCH);
    println!("  • OS: {}", std::env::consts::OS);
    println!("  • Family: {}", std::env::consts::FAMILY);
}

// ============================================================================
// SECTION 12: MAIN ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Version) => {
            handle_version();
            return Ok(());
        }
        Some(Commands::Validate { verbose }) => {
            handle_validate(&cli.config, *verbose)?;
            return Ok(());
        }
        Some(Commands::Run) | None => {}
    }

    let config = cli.to_config().context("Invalid command line configuration")?;
    init_logging(&config.logging)?;

    let registry = ClusterRegistry::load(&config.config_file).with_context(|| {
        format!("Failed to load cluster registry from {}", config.config_file.display())
    })?;

    if registry.is_empty() {
        warn!(
            target: "kafka_connect_exporter::init",
            config = %config.config_file.display(),
            "No clusters configured; every scrape will be empty"
        );
    }

    info!(
        target: "kafka_connect_exporter::init",
        version = EXPORTER_VERSION,
        clusters = registry.len(),
        max_concurrency = config.collection.max_concurrency,
        http_timeout_ms = config.collection.request_timeout.as_millis() as u64,
        scrape_timeout_ms = config.collection.scrape_timeout.as_millis() as u64,
        "Starting {}",
        EXPORTER_FULL_NAME
    );

    serve(&config, registry).await?;
    Ok(())
}

// ============================================================================
// SECTION 13: TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status(name: &str, states: &[&str]) -> ConnectorStatus {
        ConnectorStatus {
            name: name.to_string(),
            tasks: states.iter().map(|s| TaskRecord::new(*s)).collect(),
        }
    }

    fn settings() -> CollectionSettings {
        CollectionSettings {
            request_timeout: Duration::from_secs(2),
            scrape_timeout: Duration::from_secs(5),
            max_concurrency: 4,
        }
    }

    fn collector_for<S: StatusSource>(pairs: &[(&str, &str)], source: S) -> ConnectCollector<S> {
        let registry = ClusterRegistry::from_pairs(pairs.iter().copied()).unwrap();
        ConnectCollector::new(Arc::new(registry), source, settings())
    }

    fn render_text(rows: Vec<ConnectorHealth>) -> String {
        let schema = Arc::new(MetricSchema::new().unwrap());
        let encoded = render_metrics(&schema, rows, None).unwrap();
        String::from_utf8(encoded.body).unwrap()
    }

    // ------------------------------------------------------------------------
    // Classification & counting
    // ------------------------------------------------------------------------

    #[rstest]
    #[case(Some("RUNNING"), TaskHealth::Running)]
    #[case(Some("FAILED"), TaskHealth::Failing)]
    #[case(Some("PAUSED"), TaskHealth::Failing)]
    #[case(Some("UNASSIGNED"), TaskHealth::Failing)]
    #[case(Some("DESTROYED"), TaskHealth::Failing)]
    #[case(Some("RESTARTING"), TaskHealth::Failing)]
    #[case(Some("running"), TaskHealth::Failing)]
    #[case(Some("SOMETHING_NEW"), TaskHealth::Failing)]
    #[case(Some(""), TaskHealth::Failing)]
    #[case(None, TaskHealth::Failing)]
    fn test_task_classification(#[case] state: Option<&str>, #[case] expected: TaskHealth) {
        assert_eq!(TaskHealth::classify(state), expected);
    }

    #[test]
    fn test_tally_mixed_states() {
        let status = status("c1", &["RUNNING", "RUNNING", "FAILED"]);
        let counts = TaskCounts::tally(&status.tasks);
        assert_eq!(counts, TaskCounts { running: 2, failing: 1 });
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_tally_empty_task_list() {
        let counts = TaskCounts::tally(&Vec::<TaskRecord>::new());
        assert_eq!(counts, TaskCounts::default());
    }

    proptest! {
        #[test]
        fn prop_counts_cover_every_task(states in proptest::collection::vec(
            prop_oneof![
                Just(Some("RUNNING".to_string())),
                Just(Some("FAILED".to_string())),
                Just(None),
                ".{0,12}".prop_map(Some),
            ],
            0..64,
        )) {
            let tasks: Vec<TaskRecord> = states.iter().cloned().map(|state| TaskRecord { state }).collect();
            let counts = TaskCounts::tally(&tasks);
            let running = states.iter().filter(|s| s.as_deref() == Some(RUNNING_STATE)).count() as u64;

            prop_assert_eq!(counts.total(), tasks.len() as u64);
            prop_assert_eq!(counts.running, running);
            prop_assert_eq!(counts.failing, tasks.len() as u64 - running);
        }
    }

    // ------------------------------------------------------------------------
    // Payload decoding
    // ------------------------------------------------------------------------

    #[test]
    fn test_status_decoding_ignores_extra_fields() {
        let body = r#"{
            "name": "sink-1",
            "connector": {"state": "RUNNING", "worker_id": "10.0.0.1:8083"},
            "tasks": [
                {"id": 0, "state": "RUNNING", "worker_id": "10.0.0.1:8083"},
                {"id": 1, "state": "FAILED", "worker_id": "10.0.0.2:8083", "trace": "boom"},
                {"id": 2, "state": null},
                {"id": 3}
            ],
            "type": "sink"
        }"#;
        let status: ConnectorStatus = serde_json::from_str(body).unwrap();

        assert_eq!(status.name, "sink-1");
        assert_eq!(status.tasks.len(), 4);
        assert_eq!(status.tasks[2].state, None);
        assert_eq!(status.tasks[3].state, None);
        assert_eq!(TaskCounts::tally(&status.tasks), TaskCounts { running: 1, failing: 3 });
    }

    #[test]
    fn test_status_decoding_requires_tasks() {
        let result: Result<ConnectorStatus, _> = serde_json::from_str(r#"{"name": "c1"}"#);
        assert!(result.is_err());
    }

    // ------------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------------

    #[test]
    fn test_registry_from_json() {
        let registry =
            ClusterRegistry::from_json_str(r#"{"prod": "connect-prod:8083", "staging": "10.1.2.3:8083"}"#)
                .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.endpoint("prod"), Some("connect-prod:8083"));
        assert_eq!(
            registry.iter().collect::<Vec<_>>(),
            vec![("prod", "connect-prod:8083"), ("staging", "10.1.2.3:8083")]
        );
    }

    #[test]
    fn test_registry_empty_object_is_allowed() {
        let registry = ClusterRegistry::from_json_str("{}").unwrap();
        assert!(registry.is_empty());
    }

    #[rstest]
    #[case("not json")]
    #[case(r#"["connect:8083"]"#)]
    #[case(r#"{"prod": 8083}"#)]
    fn test_registry_rejects_malformed_json(#[case] json: &str) {
        let err = ClusterRegistry::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }), "got {:?}", err);
    }

    #[rstest]
    #[case("")]
    #[case("http://connect:8083")]
    #[case("connect:8083/api")]
    #[case("connect 8083")]
    fn test_registry_rejects_bad_endpoints(#[case] endpoint: &str) {
        let err = ClusterRegistry::from_pairs([("prod", endpoint)]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }), "got {:?}", err);
    }

    #[test]
    fn test_registry_rejects_empty_cluster_name() {
        let err = ClusterRegistry::from_pairs([("", "connect:8083")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_registry_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"prod": "connect-prod:8083"}}"#).unwrap();

        let registry = tokio_test::assert_ok!(ClusterRegistry::load(file.path()));
        assert_eq!(registry.endpoint("prod"), Some("connect-prod:8083"));
    }

    #[test]
    fn test_registry_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClusterRegistry::load(dir.path().join("config")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[rstest]
    #[case(":9121", "0.0.0.0:9121")]
    #[case("127.0.0.1:8080", "127.0.0.1:8080")]
    #[case("[::1]:9121", "[::1]:9121")]
    fn test_parse_listen_address(#[case] input: &str, #[case] expected: &str) {
        let expected: SocketAddr = expected.parse().unwrap();
        assert_eq!(parse_listen_address(input).unwrap(), expected);
    }

    #[test]
    fn test_bare_port_binds_all_ipv4_interfaces() {
        let addr = parse_listen_address(DEFAULT_LISTEN_ADDRESS).unwrap();
        assert!(addr.is_ipv4());
        assert!(addr.ip().is_unspecified());
        assert_eq!(addr.port(), 9121);
    }

    #[test]
    fn test_parse_listen_address_rejects_garbage() {
        tokio_test::assert_err!(parse_listen_address("not-an-address"));
    }

    #[rstest]
    #[case("/metrics", true)]
    #[case("/custom/path", true)]
    #[case("metrics", false)]
    #[case("/", false)]
    fn test_validate_metrics_path(#[case] path: &str, #[case] valid: bool) {
        assert_eq!(validate_metrics_path(path).is_ok(), valid);
    }

    #[test]
    fn test_collection_settings_validation() {
        assert!(CollectionSettings::default().validate().is_ok());

        let zero_concurrency = CollectionSettings {
            max_concurrency: 0,
            ..CollectionSettings::default()
        };
        assert!(zero_concurrency.validate().is_err());

        let zero_timeout = CollectionSettings {
            request_timeout: Duration::ZERO,
            ..CollectionSettings::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["kafka-connect-exporter"]).unwrap();
        let config = cli.to_config().unwrap();

        assert_eq!(config.listen_address, "0.0.0.0:9121".parse::<SocketAddr>().unwrap());
        assert_eq!(config.metrics_path, DEFAULT_METRICS_PATH);
        assert_eq!(config.config_file, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert_eq!(config.collection, CollectionSettings::default());
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "kafka-connect-exporter",
            "--web.listen-address",
            "127.0.0.1:9200",
            "--web.telemetry-path",
            "/scrape",
            "--config",
            "/etc/kce/clusters.json",
            "--http.timeout",
            "2s 500ms",
            "--http.max-concurrency",
            "1",
            "--log.format",
            "json",
        ])
        .unwrap();
        let config = cli.to_config().unwrap();

        assert_eq!(config.metrics_path, "/scrape");
        assert_eq!(config.collection.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.collection.max_concurrency, 1);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_cli_validate_subcommand() {
        let cli = Cli::try_parse_from(["kafka-connect-exporter", "validate", "--verbose"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Validate { verbose: true }));
    }

    // ------------------------------------------------------------------------
    // REST URLs
    // ------------------------------------------------------------------------

    #[test]
    fn test_connectors_url() {
        let url = RestStatusFetcher::connectors_url("connect:8083").unwrap();
        assert_eq!(url.as_str(), "http://connect:8083/connectors");
    }

    #[test]
    fn test_status_url_escapes_connector_name() {
        let url = RestStatusFetcher::status_url("connect:8083", "my sink/v2").unwrap();
        assert_eq!(url.as_str(), "http://connect:8083/connectors/my%20sink%2Fv2/status");
    }

    // ------------------------------------------------------------------------
    // Collector
    // ------------------------------------------------------------------------

    fn scenario_source() -> MockStatusSource {
        let mut source = MockStatusSource::new();
        source.expect_list_connectors().returning(|endpoint| match endpoint {
            "x:8083" => Ok(vec!["c1".to_string(), "c2".to_string()]),
            other => Err(FetchError::Timeout {
                url: format!("http://{}/connectors", other),
            }),
        });
        source
            .expect_fetch_status()
            .returning(|_, connector| match connector {
                "c1" => Ok(status("c1", &["RUNNING", "RUNNING", "FAILED"])),
                "c2" => Ok(status("c2", &["PAUSED"])),
                other => Err(FetchError::MalformedResponse {
                    url: format!("http://x:8083/connectors/{}/status", other),
                    message: "expected value at line 1 column 1".to_string(),
                }),
            });
        source
    }

    #[tokio::test]
    async fn test_collect_scenario_counts() {
        let collector = collector_for(&[("X", "x:8083")], scenario_source());
        let report = collector.collect().await;

        assert!(report.is_complete());
        assert_eq!(
            report.connectors,
            vec![
                ConnectorHealth::new("X", "c1", TaskCounts { running: 2, failing: 1 }),
                ConnectorHealth::new("X", "c2", TaskCounts { running: 0, failing: 1 }),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_is_idempotent() {
        let collector = collector_for(&[("X", "x:8083")], scenario_source());
        let first = collector.collect().await;
        let second = collector.collect().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unreachable_cluster_is_skipped() {
        let collector = collector_for(&[("A", "x:8083"), ("B", "down:8083")], scenario_source());
        let report = collector.collect().await;

        assert_eq!(report.for_cluster("A").count(), 2);
        assert_eq!(report.for_cluster("B").count(), 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].cluster, "B");
        assert_eq!(report.failures[0].stage, FailureStage::ListConnectors);
        assert_eq!(report.failures[0].connector, None);
    }

    #[tokio::test]
    async fn test_failed_connector_is_skipped() {
        let mut source = MockStatusSource::new();
        source
            .expect_list_connectors()
            .returning(|_| Ok(vec!["c1".to_string(), "broken".to_string()]));
        source.expect_fetch_status().returning(|_, connector| match connector {
            "c1" => Ok(status("c1", &["RUNNING"])),
            _ => Err(FetchError::HttpStatus {
                url: "http://x:8083/connectors/broken/status".to_string(),
                status: 404,
            }),
        });

        let collector = collector_for(&[("X", "x:8083")], source);
        let report = collector.collect().await;

        assert_eq!(report.connectors, vec![ConnectorHealth::new("X", "c1", TaskCounts { running: 1, failing: 0 })]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].connector.as_deref(), Some("broken"));
        assert_eq!(report.failures[0].stage, FailureStage::FetchStatus);
    }

    #[tokio::test]
    async fn test_listed_name_labels_the_connector() {
        let mut source = MockStatusSource::new();
        source
            .expect_list_connectors()
            .returning(|_| Ok(vec!["listed".to_string()]));
        source
            .expect_fetch_status()
            .returning(|_, _| Ok(status("reported", &["RUNNING"])));

        let collector = collector_for(&[("X", "x:8083")], source);
        let report = collector.collect().await;

        assert!(report.get("X", "listed").is_some());
        assert!(report.get("X", "reported").is_none());
    }

    #[tokio::test]
    async fn test_sequential_collection_matches_concurrent() {
        let registry = Arc::new(ClusterRegistry::from_pairs([("X", "x:8083")]).unwrap());
        let sequential = ConnectCollector::new(
            registry.clone(),
            scenario_source(),
            CollectionSettings {
                max_concurrency: 1,
                ..settings()
            },
        );
        let concurrent = ConnectCollector::new(registry, scenario_source(), settings());

        assert_eq!(sequential.collect().await, concurrent.collect().await);
    }

    #[tokio::test]
    async fn test_duplicate_listing_yields_one_series() {
        let mut source = MockStatusSource::new();
        source
            .expect_list_connectors()
            .returning(|_| Ok(vec!["c1".to_string(), "c1".to_string()]));
        source
            .expect_fetch_status()
            .returning(|_, connector| Ok(status(connector, &["RUNNING", "FAILED"])));

        let collector = collector_for(&[("X", "x:8083")], source);
        let report = collector.collect().await;

        assert_eq!(report.connectors, vec![ConnectorHealth::new("X", "c1", TaskCounts { running: 1, failing: 1 })]);

        let text = render_text(report.connectors);
        assert_eq!(text.matches("kafka_connect_running_task{cluster=\"X\",task=\"c1\"}").count(), 1);
        assert_eq!(text.matches("kafka_connect_failing_task{cluster=\"X\",task=\"c1\"}").count(), 1);
    }

    /// Sleeps before answering and counts how many calls ran to completion.
    struct CountingSource {
        delay: Duration,
        finished: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl StatusSource for CountingSource {
        async fn list_connectors(&self, _endpoint: &str) -> FetchResult<Vec<String>> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["c1".to_string(), "c2".to_string()])
        }

        async fn fetch_status(&self, _endpoint: &str, connector: &str) -> FetchResult<ConnectorStatus> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(status(connector, &["RUNNING", "PAUSED"]))
        }
    }

    #[tokio::test]
    async fn test_dropping_a_cycle_cancels_outbound_calls() {
        let finished = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            delay: Duration::from_millis(300),
            finished: finished.clone(),
        };
        let collector = collector_for(&[("A", "a:8083"), ("B", "b:8083"), ("C", "c:8083")], source);

        let outcome = tokio::time::timeout(Duration::from_millis(50), collector.collect()).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overlapping_cycles_are_independent() {
        let finished = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            delay: Duration::from_millis(20),
            finished: finished.clone(),
        };
        let collector = Arc::new(collector_for(&[("A", "a:8083"), ("B", "b:8083")], source));

        let expected = collector.collect().await;
        let (first, second) = tokio::join!(collector.collect(), collector.collect());

        assert_eq!(expected.connectors.len(), 4);
        assert!(expected.is_complete());
        assert_eq!(first, expected);
        assert_eq!(second, expected);
        // Each cycle makes two listings and four status calls.
        assert_eq!(finished.load(Ordering::SeqCst), 18);
    }

    struct SlowSource;

    #[async_trait]
    impl StatusSource for SlowSource {
        async fn list_connectors(&self, endpoint: &str) -> FetchResult<Vec<String>> {
            if endpoint.starts_with("slow") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(vec!["c1".to_string()])
        }

        async fn fetch_status(&self, _endpoint: &str, connector: &str) -> FetchResult<ConnectorStatus> {
            Ok(status(connector, &["RUNNING"]))
        }
    }

    #[tokio::test]
    async fn test_deadline_drops_only_the_slow_cluster() {
        let registry = ClusterRegistry::from_pairs([("fast", "fast:8083"), ("slow", "slow:8083")]).unwrap();
        let collector = ConnectCollector::new(
            Arc::new(registry),
            SlowSource,
            CollectionSettings {
                scrape_timeout: Duration::from_millis(100),
                ..settings()
            },
        );

        let started = Instant::now();
        let report = collector.collect().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(report.connectors, vec![ConnectorHealth::new("fast", "c1", TaskCounts { running: 1, failing: 0 })]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].cluster, "slow");
        assert_eq!(report.failures[0].stage, FailureStage::Deadline);
    }

    // ------------------------------------------------------------------------
    // Exposition
    // ------------------------------------------------------------------------

    #[test]
    fn test_schema_describes_both_gauges() {
        let schema = MetricSchema::new().unwrap();
        let names: Vec<&str> = schema.descs().into_iter().map(|d| d.fq_name.as_str()).collect();
        assert_eq!(names, vec![RUNNING_TASK_METRIC, FAILING_TASK_METRIC]);
        for desc in schema.descs() {
            assert_eq!(desc.variable_labels, vec![CLUSTER_LABEL.to_string(), TASK_LABEL.to_string()]);
        }
    }

    #[test]
    fn test_render_scenario_text() {
        let text = render_text(vec![
            ConnectorHealth::new("X", "c1", TaskCounts { running: 2, failing: 1 }),
            ConnectorHealth::new("X", "c2", TaskCounts { running: 0, failing: 1 }),
        ]);

        assert!(text.contains("# HELP kafka_connect_running_task Number of running task"));
        assert!(text.contains("# TYPE kafka_connect_running_task gauge"));
        assert!(text.contains("# HELP kafka_connect_failing_task Number of failing task"));
        assert!(text.contains("# TYPE kafka_connect_failing_task gauge"));
        assert!(text.contains("kafka_connect_running_task{cluster=\"X\",task=\"c1\"} 2\n"));
        assert!(text.contains("kafka_connect_failing_task{cluster=\"X\",task=\"c1\"} 1\n"));
        assert!(text.contains("kafka_connect_running_task{cluster=\"X\",task=\"c2\"} 0\n"));
        assert!(text.contains("kafka_connect_failing_task{cluster=\"X\",task=\"c2\"} 1\n"));
    }

    #[test]
    fn test_render_labels_exactly() {
        let text = render_text(vec![ConnectorHealth::new("prod", "sink-1", TaskCounts { running: 3, failing: 0 })]);
        assert!(text.contains("kafka_connect_running_task{cluster=\"prod\",task=\"sink-1\"} 3\n"));
        assert!(text.contains("kafka_connect_failing_task{cluster=\"prod\",task=\"sink-1\"} 0\n"));
    }

    #[test]
    fn test_render_empty_snapshot_has_no_samples() {
        let text = render_text(Vec::new());
        assert!(!text.contains("kafka_connect_running_task{"));
        assert!(!text.contains("kafka_connect_failing_task{"));
    }

    #[test]
    fn test_render_protobuf_when_requested() {
        let schema = Arc::new(MetricSchema::new().unwrap());
        let rows = vec![ConnectorHealth::new("X", "c1", TaskCounts { running: 1, failing: 0 })];
        let accept = "application/vnd.google.protobuf;proto=io.prometheus.client.MetricFamily;encoding=delimited;q=0.7,text/plain;version=0.0.4;q=0.3";

        let encoded = render_metrics(&schema, rows, Some(accept)).unwrap();
        assert!(encoded.content_type.starts_with(PROTOBUF_MEDIA_TYPE));
        assert!(!encoded.body.is_empty());
    }

    #[rstest]
    #[case(None, false)]
    #[case(Some("text/plain"), false)]
    #[case(Some("*/*"), false)]
    #[case(Some("application/vnd.google.protobuf;proto=io.prometheus.client.MetricFamily;encoding=delimited"), true)]
    fn test_accepts_protobuf(#[case] accept: Option<&str>, #[case] expected: bool) {
        assert_eq!(accepts_protobuf(accept), expected);
    }

    #[test]
    fn test_landing_page_links_metrics_path() {
        let html = landing_html("/custom");
        assert!(html.contains("<title>Kafka connect exporter</title>"));
        assert!(html.contains("<a href='/custom'>Metrics</a>"));
    }

    #[test]
    fn test_fetch_error_classification() {
        let timeout = FetchError::Timeout { url: "http://x/connectors".into() };
        let status = FetchError::HttpStatus { url: "http://x/connectors".into(), status: 503 };
        let malformed = FetchError::MalformedResponse { url: "http://x/connectors".into(), message: "eof".into() };

        assert!(timeout.is_network() && !timeout.is_malformed());
        assert!(status.is_network());
        assert!(malformed.is_malformed() && !malformed.is_network());
        assert_eq!(ExporterError::from(malformed).category(), "malformed_response");
    }
}

// ============================================================================
// SECTION 14: END-TO-END TESTS
// ============================================================================
// A fake Connect REST worker served by axum on an ephemeral port, polled by
// the real fetcher and exposed through the real router.
// ============================================================================
