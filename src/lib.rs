//! Prometheus exporter for Cloudflare Workers analytics
//!
//! Every scrape queries the GraphQL analytics API for the request counts of
//! the current week and the CPU time of the last minute, and translates the
//! answers into Prometheus metrics.

pub mod analytics;
pub mod exporter;
pub mod metrics;
pub mod server;
