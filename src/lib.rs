#![deny(missing_docs)]

//! Local file cache and ingestion helpers for LlamaCloud managed pipelines.

/// HTTP routing and REST handlers.
pub mod api;
/// LlamaCloud REST client and wire types.
pub mod cloud;
/// Environment-driven configuration management.
pub mod config;
/// Structured logging and tracing setup.
pub mod logging;
/// Cache and ingestion metrics helpers.
pub mod metrics;
/// Pipeline file cache, ingestion polling, and background download scheduling.
pub mod sync;
