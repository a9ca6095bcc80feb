//! The Dashboard Source Client: an authenticated HTTP client over the
//! upstream BI service, exposing `fetch_dashboard` and
//! `fetch_dashboards_by_tags`.

pub mod client;
pub mod error;
pub mod fetch;
pub mod wire;

pub use client::{DashboardSourceConfig, DashboardSourceTransport};
pub use error::DashboardSourceError;
pub use fetch::{fetch_dashboard, fetch_dashboards_by_tags};
