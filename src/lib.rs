//! Client for the BLS public data API.
//!
//! [`http::ResilientSession`] applies a timeout/retry policy to every request
//! and fails on any final non-2xx status. [`series::SeriesClient`] builds
//! `timeseries/data` queries on top of it and flattens the response into
//! [`series::SeriesRecord`]s, falling back to the raw response when the body
//! is not what it expects.

pub mod commands;
pub mod config;
pub mod http;
pub mod runtime;
pub mod series;

pub use config::Config;
pub use http::{ResilientSession, SessionPolicy};
pub use series::{ApiResponse, SeriesClient, SeriesQuery, SeriesRecord, SeriesSource};
