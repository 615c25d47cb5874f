use anyhow::{Context, Result};
use log::{debug, info};
use std::io::Write;

use crate::series::{ApiResponse, SeriesQuery, SeriesSource};

/// How a fetch ended, for choosing the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Records(usize),
    NotProcessed,
    Raw { status: u16 },
}

/// Fetch a query and write the result.
///
/// Records go to `out` as a pretty-printed JSON array. API rejections go to
/// `err`. A raw response is written to `out` as a status line followed by the body.
#[tracing::instrument(skip(source, out, err))]
pub async fn fetch<S: SeriesSource, O: Write, E: Write>(
    source: &S,
    query: &SeriesQuery,
    raw: bool,
    out: &mut O,
    err: &mut E,
) -> Result<Outcome> {
    let fetched = source.fetch(query, raw).await?;

    for notice in &fetched.notices {
        writeln!(err, "warning: {}", notice)?;
    }

    match fetched.response {
        ApiResponse::Success(records) => {
            info!("Fetched {} records", records.len());
            serde_json::to_writer_pretty(&mut *out, &records)
                .context("Failed to write records")?;
            writeln!(out)?;
            Ok(Outcome::Records(records.len()))
        }
        ApiResponse::NotProcessed { status, message } => {
            writeln!(err, "{}", status)?;
            for line in message {
                writeln!(err, "  {}", line)?;
            }
            Ok(Outcome::NotProcessed)
        }
        ApiResponse::RawPassthrough(response) => {
            debug!("Writing raw response ({} bytes)", response.body.len());
            writeln!(out, "HTTP {}", response.status)?;
            writeln!(out, "{}", response.body)?;
            Ok(Outcome::Raw {
                status: response.status,
            })
        }
    }
}
