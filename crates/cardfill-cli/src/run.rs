//! `cardfill run`: the plugin host's fill loop against a running server.
//!
//! Merchants are looked up one at a time, in order, and every step is
//! reported as a [`PluginEvent`] JSON line. A failed lookup is reported and
//! counted; it never stops the loop.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use reqwest::Client;

use cardfill_core::plugin::{PluginEvent, RunRequest, StatusCode};
use cardfill_core::{encode_component, MerchantRecord};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs the fill loop and returns the number of merchants that failed.
///
/// # Errors
///
/// Returns an error only when the HTTP client cannot be built or events
/// cannot be written.
pub(crate) async fn run_plugin<W: Write>(
    request: &RunRequest,
    fetch_images: bool,
    out: &mut W,
) -> anyhow::Result<usize> {
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let toggles = request.layer_toggles;
    let mut error_count = 0usize;

    for (index, name) in request.merchants.iter().enumerate() {
        if !(toggles.name || toggles.logo || toggles.hero) {
            emit(out, &status(index, StatusCode::Skipped, None))?;
            continue;
        }

        emit(out, &status(index, StatusCode::Fetch, None))?;
        let record = match fetch_lookup(&client, &request.server_base, name).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(index, %name, error = %e, "lookup failed");
                error_count += 1;
                emit(out, &status(index, StatusCode::Error, Some(e.to_string())))?;
                continue;
            }
        };

        if fetch_images {
            emit(out, &status(index, StatusCode::Populate, None))?;
            let wanted = [
                (toggles.logo, record.logo_url.as_deref()),
                (toggles.hero, record.hero_url.as_deref()),
            ];
            for url in wanted
                .into_iter()
                .filter_map(|(enabled, url)| url.filter(|_| enabled))
            {
                // A failed image leaves its layer untouched.
                match fetch_image(&client, &request.server_base, url).await {
                    Ok(bytes) => tracing::debug!(index, %url, bytes, "image fetched"),
                    Err(e) => {
                        tracing::warn!(index, %name, %url, error = %e, "image fetch failed");
                    }
                }
            }
        }

        emit(out, &status(index, StatusCode::Done, None))?;
    }

    emit(out, &PluginEvent::Complete { error_count })?;
    Ok(error_count)
}

async fn fetch_lookup(client: &Client, base: &str, name: &str) -> anyhow::Result<MerchantRecord> {
    let url = format!("{base}/lookup?name={}", encode_component(name));
    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("Lookup failed ({}) for {name}", status.as_u16());
    }
    response
        .json::<MerchantRecord>()
        .await
        .with_context(|| format!("invalid lookup response for {name}"))
}

/// Downloads an image through the server's proxy and returns its size.
async fn fetch_image(client: &Client, base: &str, url: &str) -> anyhow::Result<usize> {
    let proxied = format!("{base}/image?url={}", encode_component(url));
    let response = client.get(&proxied).send().await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("Image fetch failed ({})", status.as_u16());
    }
    Ok(response.bytes().await?.len())
}

fn status(index: usize, code: StatusCode, error: Option<String>) -> PluginEvent {
    PluginEvent::Status { index, code, error }
}

fn emit<W: Write>(out: &mut W, event: &PluginEvent) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, event)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
