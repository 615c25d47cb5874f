use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::BTreeMap;

use super::query::{Notice, OptionalParams, PreparedRequest, SeriesQuery};
use super::types::{
    Envelope, Results, STATUS_NOT_PROCESSED, STATUS_SUCCEEDED, SeriesRecord, footnote_text,
    value_text,
};
use crate::config::Config;
use crate::http::{HttpMethod, RawResponse, ResilientSession};
use crate::runtime::{RealRuntime, Runtime};

/// Path of the time-series data endpoint, relative to the API base URL.
pub const TIMESERIES_DATA_PATH: &str = "timeseries/data";

/// Outcome of a fetch once the HTTP exchange succeeded.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// Records flattened in series-then-period order.
    Success(Vec<SeriesRecord>),
    /// The API rejected the request (bad series ID, invalid year range, ...).
    NotProcessed { status: String, message: Vec<String> },
    /// Raw mode was requested, or the body did not have the expected shape.
    RawPassthrough(RawResponse),
}

/// A response together with notices raised while preparing the request.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub response: ApiResponse,
    pub notices: Vec<Notice>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// Fetches `query`. With `raw`, the response body is returned uninspected.
    async fn fetch(&self, query: &SeriesQuery, raw: bool) -> Result<Fetched>;
}

/// Client for the `timeseries/data` endpoint.
pub struct SeriesClient<R: Runtime = RealRuntime> {
    runtime: R,
    session: ResilientSession,
    registration_key: Option<String>,
    api_url: String,
}

impl<R: Runtime> SeriesClient<R> {
    pub fn new(
        runtime: R,
        session: ResilientSession,
        registration_key: Option<String>,
        api_url: &str,
    ) -> Self {
        Self {
            runtime,
            session,
            registration_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds a client with a fresh session from the configuration.
    #[tracing::instrument(skip(config))]
    pub fn from_config(config: Config<R>) -> Result<Self> {
        let session = ResilientSession::new(config.policy)?;
        Ok(Self::new(
            config.runtime,
            session,
            config.registration_key,
            &config.api_url,
        ))
    }

    pub fn data_url(&self) -> String {
        format!("{}/{}", self.api_url, TIMESERIES_DATA_PATH)
    }
}

#[async_trait]
impl<R: Runtime> SeriesSource for SeriesClient<R> {
    #[tracing::instrument(skip(self, query), fields(series = query.series_ids.len()))]
    async fn fetch(&self, query: &SeriesQuery, raw: bool) -> Result<Fetched> {
        let prepared = PreparedRequest::build(
            query,
            self.registration_key.as_deref(),
            self.runtime.current_year(),
        )?;
        let body =
            serde_json::to_value(&prepared.body).context("Failed to serialize request body")?;
        let url = self.data_url();

        info!(
            "Requesting {} series for {}-{} from {}...",
            prepared.body.seriesid.len(),
            prepared.body.startyear,
            prepared.body.endyear,
            url
        );

        let response = self
            .session
            .send(
                HttpMethod::Post,
                &url,
                &[("Content-type", "application/json")],
                Some(&body),
            )
            .await?;

        let response = if raw {
            ApiResponse::RawPassthrough(response)
        } else {
            normalize(response, prepared.params)
        };

        Ok(Fetched {
            response,
            notices: prepared.notices,
        })
    }
}

/// Turns a response body into records. Anything unexpected comes back as
/// [`ApiResponse::RawPassthrough`] instead of an error.
pub fn normalize(response: RawResponse, params: OptionalParams) -> ApiResponse {
    let envelope: Envelope = match serde_json::from_str(&response.body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Unrecognized response body ({}), returning raw response", e);
            return ApiResponse::RawPassthrough(response);
        }
    };

    match envelope.status.as_str() {
        STATUS_NOT_PROCESSED => {
            for message in &envelope.message {
                warn!("{}: {}", envelope.status, message);
            }
            ApiResponse::NotProcessed {
                status: envelope.status,
                message: envelope.message,
            }
        }
        STATUS_SUCCEEDED => {
            let results = match envelope
                .results
                .map(serde_json::from_value::<Results>)
                .transpose()
            {
                Ok(Some(results)) => results,
                Ok(None) => {
                    warn!("Succeeded response has no Results, returning raw response");
                    return ApiResponse::RawPassthrough(response);
                }
                Err(e) => {
                    warn!("Unexpected Results shape ({}), returning raw response", e);
                    return ApiResponse::RawPassthrough(response);
                }
            };
            for message in &envelope.message {
                warn!("{}", message);
            }
            ApiResponse::Success(flatten(results, params))
        }
        other => {
            debug!("Unhandled response status {}, returning raw response", other);
            ApiResponse::RawPassthrough(response)
        }
    }
}

fn flatten(results: Results, params: OptionalParams) -> Vec<SeriesRecord> {
    let mut records = Vec::new();

    for series in results.series {
        let catalog = params
            .catalog
            .then(|| series.catalog.clone().unwrap_or_default());

        for obs in series.data {
            let mut calculations = BTreeMap::new();
            if params.calculations {
                for (calc_type, by_period) in obs.calculations.iter().flatten() {
                    for (period, value) in by_period {
                        calculations.insert(format!("{}_{}", calc_type, period), value_text(value));
                    }
                }
            }

            records.push(SeriesRecord {
                series_id: series.series_id.clone(),
                year: obs.year,
                period: obs.period_name.unwrap_or_else(|| obs.period.clone()),
                period_code: obs.period,
                value: obs.value,
                footnotes: footnote_text(obs.footnotes.as_deref()),
                catalog: catalog.clone(),
                aspects: if params.aspects {
                    Some(obs.aspects.unwrap_or(serde_json::Value::Null))
                } else {
                    None
                },
                calculations,
            });
        }
    }

    debug!("Normalized {} records", records.len());
    records
}
