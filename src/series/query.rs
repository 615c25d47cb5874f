//! Time-series query, validation and wire request body.

use log::warn;
use serde::Serialize;
use std::fmt;

/// Hard API limit on series per request.
pub const MAX_SERIES_PER_QUERY: usize = 50;

/// Inclusive year span available without a registration key.
pub const UNREGISTERED_YEAR_SPAN: i32 = 10;

/// Inclusive year span available with a registration key.
pub const REGISTERED_YEAR_SPAN: i32 = 20;

/// More series were requested than a single call allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooManySeriesError {
    pub count: usize,
}

impl fmt::Display for TooManySeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Maximum of {} series allowed per query, got {}. Split the request into smaller batches.",
            MAX_SERIES_PER_QUERY, self.count
        )
    }
}

impl std::error::Error for TooManySeriesError {}

/// Non-fatal condition reported alongside a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// Optional parameters were requested without a registration key and were turned off.
    OptionalParamsDropped,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::OptionalParamsDropped => write!(
                f,
                "Optional parameters (catalog, calculations, annual average, aspects) require a registration key and were disabled"
            ),
        }
    }
}

/// A request for one or more series over a year window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesQuery {
    pub series_ids: Vec<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub include_catalog: bool,
    pub include_calculations: bool,
    pub include_annual_average: bool,
    pub include_aspects: bool,
    /// Turns on every optional parameter when a key is present.
    pub all_optional_params: bool,
}

impl SeriesQuery {
    pub fn new<I, S>(series_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            series_ids: series_ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn years(mut self, start_year: Option<i32>, end_year: Option<i32>) -> Self {
        self.start_year = start_year;
        self.end_year = end_year;
        self
    }

    pub fn catalog(mut self, on: bool) -> Self {
        self.include_catalog = on;
        self
    }

    pub fn calculations(mut self, on: bool) -> Self {
        self.include_calculations = on;
        self
    }

    pub fn annual_average(mut self, on: bool) -> Self {
        self.include_annual_average = on;
        self
    }

    pub fn aspects(mut self, on: bool) -> Self {
        self.include_aspects = on;
        self
    }

    pub fn all_optional(mut self, on: bool) -> Self {
        self.all_optional_params = on;
        self
    }

    pub fn validate(&self) -> Result<(), TooManySeriesError> {
        if self.series_ids.len() > MAX_SERIES_PER_QUERY {
            return Err(TooManySeriesError {
                count: self.series_ids.len(),
            });
        }
        Ok(())
    }

    fn requested_params(&self) -> OptionalParams {
        if self.all_optional_params {
            return OptionalParams::all();
        }
        OptionalParams {
            catalog: self.include_catalog,
            calculations: self.include_calculations,
            annual_average: self.include_annual_average,
            aspects: self.include_aspects,
        }
    }
}

/// The optional enrichment flags actually sent on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionalParams {
    pub catalog: bool,
    pub calculations: bool,
    pub annual_average: bool,
    pub aspects: bool,
}

impl OptionalParams {
    pub fn all() -> Self {
        Self {
            catalog: true,
            calculations: true,
            annual_average: true,
            aspects: true,
        }
    }

    pub fn any(&self) -> bool {
        self.catalog || self.calculations || self.annual_average || self.aspects
    }
}

/// Fills in a missing start/end year so the inclusive span matches what the
/// key tier allows. Explicit years pass through untouched.
pub fn resolve_years(
    start_year: Option<i32>,
    end_year: Option<i32>,
    current_year: i32,
    registered: bool,
) -> (i32, i32) {
    let span = if registered {
        REGISTERED_YEAR_SPAN
    } else {
        UNREGISTERED_YEAR_SPAN
    };
    (
        start_year.unwrap_or(current_year - (span - 1)),
        end_year.unwrap_or(current_year),
    )
}

/// JSON body of a `timeseries/data` request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RequestBody {
    pub seriesid: Vec<String>,
    pub startyear: String,
    pub endyear: String,
    pub catalog: bool,
    pub calculations: bool,
    pub annualaverage: bool,
    pub aspects: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registrationkey: Option<String>,
}

/// A validated query ready to send, with the effective flags and any notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub body: RequestBody,
    pub params: OptionalParams,
    pub notices: Vec<Notice>,
}

impl PreparedRequest {
    /// Validates `query` and resolves defaults against the key tier and the current year.
    pub fn build(
        query: &SeriesQuery,
        registration_key: Option<&str>,
        current_year: i32,
    ) -> Result<Self, TooManySeriesError> {
        query.validate()?;

        let registration_key = registration_key.filter(|k| !k.trim().is_empty());
        let registered = registration_key.is_some();

        let mut notices = Vec::new();
        let requested = query.requested_params();
        let params = if registered {
            requested
        } else {
            if requested.any() {
                warn!("{}", Notice::OptionalParamsDropped);
                notices.push(Notice::OptionalParamsDropped);
            }
            OptionalParams::default()
        };

        let (start_year, end_year) =
            resolve_years(query.start_year, query.end_year, current_year, registered);

        Ok(Self {
            body: RequestBody {
                seriesid: query.series_ids.clone(),
                startyear: start_year.to_string(),
                endyear: end_year.to_string(),
                catalog: params.catalog,
                calculations: params.calculations,
                annualaverage: params.annual_average,
                aspects: params.aspects,
                registrationkey: registration_key.map(str::to_string),
            },
            params,
            notices,
        })
    }
}
