//! Wattlog service: imports meter exports, keeps weather history aligned with consumption
//! and computes the consumption, tariff and solar figures the dashboards display.

pub mod analytics;
pub mod api;
pub mod config;
pub mod importer;
pub mod metrics_server;
pub mod observability;
pub mod parse;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod sinks;
pub mod sources;
pub mod transform;
pub mod weather;

pub use pipeline::{Envelope, Pipeline};
