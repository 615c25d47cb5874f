//! BLS time-series queries and response normalization.
//!
//! # Structure
//!
//! - `query` - Query validation, default year window, request body
//! - `types` - Wire types and the flattened [`SeriesRecord`]
//! - `client` - [`SeriesClient`] and the fallback-to-raw normalization

mod client;
mod query;
mod types;

pub use client::{ApiResponse, Fetched, SeriesClient, SeriesSource, TIMESERIES_DATA_PATH, normalize};
pub use query::{
    MAX_SERIES_PER_QUERY, Notice, OptionalParams, PreparedRequest, REGISTERED_YEAR_SPAN,
    RequestBody, SeriesQuery, TooManySeriesError, UNREGISTERED_YEAR_SPAN, resolve_years,
};
pub use types::{Catalog, STATUS_NOT_PROCESSED, STATUS_SUCCEEDED, SeriesRecord};

#[cfg(test)]
pub use client::MockSeriesSource;
