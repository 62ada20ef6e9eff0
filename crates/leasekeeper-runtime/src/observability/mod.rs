//! Metrics and instance listing over HTTP.

pub mod prometheus;
mod server;

pub use server::{router, HealthResponse, ObservabilityServer, ObservabilityState};
