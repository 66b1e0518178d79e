//! `cardfill lookup`: resolve merchants through the same service the server
//! uses, without starting the server.

use std::io::Write;

use futures::stream::{self, StreamExt};
use serde::Serialize;

use cardfill_core::{AppConfig, LookupQuery, MerchantRecord};

#[derive(Debug, Serialize)]
pub(crate) struct LookupLine {
    pub query: String,
    #[serde(flatten)]
    pub record: MerchantRecord,
}

/// Resolves every name and prints the results to stdout.
///
/// Results keep input order. Hard failures are printed as records carrying
/// only `error` and turn into a non-zero exit once everything is printed.
///
/// # Errors
///
/// Returns an error if the service cannot be built, output cannot be
/// written, or any lookup failed.
pub(crate) async fn run_lookup(
    config: &AppConfig,
    names: &[String],
    pretty: bool,
) -> anyhow::Result<()> {
    if names.is_empty() {
        anyhow::bail!("no merchant names given");
    }

    let (service, session) = cardfill_lookup::build_live_service(config)
        .map_err(|e| anyhow::anyhow!("failed to build lookup service: {e}"))?;
    let service = &service;

    let lines = stream::iter(names.iter().cloned())
        .map(move |name| async move {
            let record = match LookupQuery::parse(&name) {
                Ok(query) => service.lookup(&query).await.unwrap_or_else(|e| {
                    tracing::warn!(%query, error = %e, "lookup failed");
                    failed(e.to_string())
                }),
                Err(e) => failed(e.to_string()),
            };
            LookupLine {
                query: name,
                record,
            }
        })
        .buffered(config.batch_concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    session.shutdown().await;

    let failures = lines
        .iter()
        .filter(|line| line.record.error.is_some() && line.record.name.is_none())
        .count();
    write_lines(&mut std::io::stdout(), &lines, pretty)?;

    if failures > 0 {
        anyhow::bail!("{failures} of {} lookups failed", lines.len());
    }
    Ok(())
}

pub(crate) fn write_lines<W: Write>(
    out: &mut W,
    lines: &[LookupLine],
    pretty: bool,
) -> anyhow::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, lines)?;
        writeln!(out)?;
    } else {
        for line in lines {
            serde_json::to_writer(&mut *out, line)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn failed(error: String) -> MerchantRecord {
    MerchantRecord {
        error: Some(error),
        ..MerchantRecord::default()
    }
}
