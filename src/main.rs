use anyhow::Result;
use bls_fetch::{
    Config, SeriesClient, SeriesQuery, SessionPolicy,
    commands::{self, Outcome},
    http::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS},
};
use clap::Parser;
use std::process::ExitCode;

/// bls-fetch - BLS public data API client
///
/// Fetch one or more time series and print them as JSON records.
///
/// If the BLS_API_KEY environment variable is set, it is used as the
/// registration key. A key allows 20-year windows and the optional
/// catalog, calculations, annual average and aspects data.
///
/// Examples:
///   bls-fetch LNS14000000 CES0000000001
///   bls-fetch --start-year 2015 --end-year 2020 LNS14000000
#[derive(Parser, Debug)]
#[command(author, version = env!("BLS_FETCH_VERSION"), about)]
struct Cli {
    /// Series IDs to fetch (at most 50)
    #[arg(value_name = "SERIES_ID", required = true)]
    series_ids: Vec<String>,

    /// Registration key (overrides BLS_API_KEY)
    #[arg(long = "api-key", value_name = "KEY")]
    api_key: Option<String>,

    /// API base URL (defaults to https://api.bls.gov/publicAPI/v2/)
    #[arg(long = "api-url", value_name = "URL")]
    api_url: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECS as i64, allow_negative_numbers = true)]
    timeout: i64,

    /// Retries for transient failures
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_RETRIES as i64, allow_negative_numbers = true)]
    retries: i64,

    /// First year of the window
    #[arg(long = "start-year", value_name = "YEAR")]
    start_year: Option<i32>,

    /// Last year of the window
    #[arg(long = "end-year", value_name = "YEAR")]
    end_year: Option<i32>,

    /// Include catalog metadata
    #[arg(long)]
    catalog: bool,

    /// Include net and percent change calculations
    #[arg(long)]
    calculations: bool,

    /// Include annual averages
    #[arg(long = "annual-average")]
    annual_average: bool,

    /// Include aspect data
    #[arg(long)]
    aspects: bool,

    /// Include all optional data
    #[arg(long)]
    all: bool,

    /// Print the raw response instead of records
    #[arg(long)]
    raw: bool,
}

impl Cli {
    fn query(&self) -> SeriesQuery {
        SeriesQuery::new(self.series_ids.iter().cloned())
            .years(self.start_year, self.end_year)
            .catalog(self.catalog)
            .calculations(self.calculations)
            .annual_average(self.annual_average)
            .aspects(self.aspects)
            .all_optional(self.all)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let policy = SessionPolicy::from_secs(cli.timeout, cli.retries)?;
    let config = Config::new(
        bls_fetch::runtime::RealRuntime,
        cli.api_key.clone(),
        cli.api_url.clone(),
        policy,
    );
    let client = SeriesClient::from_config(config)?;

    let outcome = commands::fetch(
        &client,
        &cli.query(),
        cli.raw,
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )
    .await?;

    Ok(match outcome {
        Outcome::NotProcessed => ExitCode::from(2),
        Outcome::Records(_) | Outcome::Raw { .. } => ExitCode::SUCCESS,
    })
}
