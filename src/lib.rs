//! Prometheus exporter for PrusaLink 3D printers.
//!
//! This crate polls one or more PrusaLink printer controllers over their
//! HTTP+JSON status API and exposes the normalized state via an HTTP
//! `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │    Printers     │────>│    Collector    │────>│   HTTP Server   │
//! │  (PrusaLink)    │     │  (per-scrape)   │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Every inbound scrape refreshes all configured printers concurrently,
//! derives metric records from the fresh snapshots, and renders them into
//! metric families. Nothing persists between scrapes: a printer that stops
//! answering simply drops out of the output (except for its
//! `prusalink_scrape_successful 0` sample).
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! prusalink-exporter --config config.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod client;
pub mod collector;
pub mod config;
pub mod http;
pub mod mapping;

pub use client::{PrinterClient, Resource, ScrapeSnapshot};
pub use collector::{MetricCollector, SharedCollector};
pub use config::ExporterConfig;
pub use http::HttpServer;
