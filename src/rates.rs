use std::time::Duration;

use anyhow::Context as _;

use crate::config::Config;
use crate::formats::{Rate, RateSource};

pub const DEFAULT_BASE_URL: &str = "https://api.frankfurter.app";
const QUOTE: &str = "JPY";
const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// Pairs shown on the dashboard, with the value used when the lookup fails.
pub const PAIRS: [(&str, f64); 2] = [("USD", 148.52), ("CAD", 109.15)];

/// One rate per entry of [`PAIRS`]. Each pair falls back independently.
pub async fn fetch(base_url: &str) -> Vec<Rate> {
    let client = match reqwest::Client::builder().timeout(FETCH_TIMEOUT).build() {
        Ok(client) => Some(client),
        Err(err) => {
            tracing::warn!(err = %err, "build rates http client");
            None
        }
    };

    let mut rates = Vec::with_capacity(PAIRS.len());
    for (base, fallback) in PAIRS {
        let live = match &client {
            Some(client) => match fetch_pair(client, base_url, base).await {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!(base, err = %format!("{err:#}"), "exchange rate unavailable");
                    None
                }
            },
            None => None,
        };
        rates.push(match live {
            Some(value) => Rate {
                base: base.to_owned(),
                quote: QUOTE.to_owned(),
                value,
                source: RateSource::Live,
            },
            None => fallback_rate(base, fallback),
        });
    }
    rates
}

fn fallback_rate(base: &str, value: f64) -> Rate {
    Rate {
        base: base.to_owned(),
        quote: QUOTE.to_owned(),
        value,
        source: RateSource::Fallback,
    }
}

async fn fetch_pair(client: &reqwest::Client, base_url: &str, base: &str) -> anyhow::Result<f64> {
    let endpoint = format!("{}/latest", base_url.trim_end_matches('/'));
    let response = client
        .get(&endpoint)
        .query(&[("from", base), ("to", QUOTE)])
        .send()
        .await
        .with_context(|| format!("GET {endpoint}"))?;
    if !response.status().is_success() {
        anyhow::bail!("rates API returned {}", response.status());
    }
    let raw = response.text().await.context("read rates response body")?;
    parse_rate(&raw, QUOTE)
}

fn parse_rate(raw: &str, quote: &str) -> anyhow::Result<f64> {
    let value: serde_json::Value = serde_json::from_str(raw).context("parse rates response")?;
    let rate = value
        .get("rates")
        .and_then(|rates| rates.get(quote))
        .and_then(serde_json::Value::as_f64)
        .with_context(|| format!("missing `rates.{quote}` in response"))?;
    if !rate.is_finite() || rate <= 0.0 {
        anyhow::bail!("implausible rate {rate}");
    }
    Ok(rate)
}

pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env();
    for rate in fetch(&config.rates_base_url).await {
        let marker = match rate.source {
            RateSource::Live => "",
            RateSource::Fallback => " (offline)",
        };
        println!("{}/{}  {:.2}{marker}", rate.base, rate.quote, rate.value);
    }
    Ok(())
}
