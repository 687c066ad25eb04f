//! Yahoo Finance Quote Provider
//!
//! Unterstützt:
//! - Suche nach ISIN / Ticker / Name
//! - Historische Kurse (Daily) für mehrere Symbole in einem Request
//! - Adjusted Close (Dividenden-bereinigt)

use super::{PriceBar, QuoteProvider, SearchMatch};
use crate::config::ProviderConfig;
use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Offset};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::time::Duration;

const SEARCH_URL: &str = "https://query1.finance.yahoo.com/v1/finance/search";
const SPARK_URL: &str = "https://query1.finance.yahoo.com/v7/finance/spark";
const RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct YahooProvider {
    client: reqwest::Client,
    max_retries: u32,
}

impl YahooProvider {
    /// HTTP Client mit korrekten Headers erstellen
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| anyhow!("Invalid user agent: {}", e))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    /// GET with a bounded retry on timeouts, connection failures, 429 and 5xx.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let mut attempt = 0;
        loop {
            let err = match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json()
                            .await
                            .map_err(|e| anyhow!("Failed to parse JSON from {}: {}", url, e));
                    }

                    let body = response.text().await.unwrap_or_default();
                    let err = anyhow!("HTTP error: {} - {}", status, body);
                    if !(status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS) {
                        return Err(err);
                    }
                    err
                }
                Err(e) if e.is_timeout() || e.is_connect() => anyhow!("Request failed: {}", e),
                Err(e) => return Err(anyhow!("Request failed: {}", e)),
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            attempt += 1;
            log::warn!(
                "Yahoo request failed ({}), retry {}/{}",
                err,
                attempt,
                self.max_retries
            );
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
}

impl QuoteProvider for YahooProvider {
    fn name(&self) -> &str {
        "YAHOO"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchMatch>> {
        let url = format!(
            "{}?q={}&quotesCount=10&newsCount=0",
            SEARCH_URL,
            urlencoding::encode(query)
        );
        log::debug!("Yahoo search for: {}", query);

        let data = self.get_json(&url).await?;
        parse_search(data)
    }

    async fn fetch_history(
        &self,
        symbols: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<HashMap<String, Vec<PriceBar>>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        // Yahoo verwendet Unix-Timestamps
        let from_ts = from
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        let to_ts = to
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);

        let joined = symbols.join(",");
        let url = format!(
            "{}?symbols={}&period1={}&period2={}&interval=1d&includeAdjustedClose=true",
            SPARK_URL,
            urlencoding::encode(&joined),
            from_ts,
            to_ts
        );
        log::debug!("Fetching Yahoo history for {} symbols from {}", symbols.len(), url);

        let data = self.get_json(&url).await?;
        parse_spark(&data)
    }
}

/// Search Response from Yahoo Finance
#[derive(Debug, serde::Deserialize)]
struct SearchResponse {
    quotes: Option<Vec<SearchQuote>>,
}

#[derive(Debug, serde::Deserialize)]
struct SearchQuote {
    symbol: Option<String>,
    shortname: Option<String>,
    longname: Option<String>,
}

fn parse_search(data: serde_json::Value) -> Result<Vec<SearchMatch>> {
    let response: SearchResponse = serde_json::from_value(data)
        .map_err(|e| anyhow!("Failed to parse Yahoo search response: {}", e))?;

    let results = response
        .quotes
        .unwrap_or_default()
        .into_iter()
        .filter_map(|q| {
            let symbol = q.symbol?.trim().to_string();
            if symbol.is_empty() {
                return None;
            }
            Some(SearchMatch {
                symbol,
                short_name: q.shortname.or(q.longname).filter(|n| !n.trim().is_empty()),
            })
        })
        .collect();

    Ok(results)
}

/// Batch-Response parsen
///
/// Yahoo liefert pro Symbol ein Chart-Objekt:
/// ```json
/// "spark": {
///   "result": [
///     { "symbol": "AAPL", "response": [ { "timestamp": [...], "indicators": {...} } ] }
///   ]
/// }
/// ```
fn parse_spark(data: &serde_json::Value) -> Result<HashMap<String, Vec<PriceBar>>> {
    let spark = data
        .get("spark")
        .ok_or_else(|| anyhow!("Invalid response format"))?;

    if let Some(error) = spark.get("error").and_then(|e| e.as_object()) {
        let code = error.get("code").and_then(|c| c.as_str()).unwrap_or("unknown");
        let desc = error
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or("No description");
        log::error!("Yahoo API returned error: {} - {}", code, desc);
        return Err(anyhow!("Yahoo API error: {} - {}", code, desc));
    }

    let results = spark
        .get("result")
        .and_then(|r| r.as_array())
        .ok_or_else(|| anyhow!("Missing result"))?;

    let mut history = HashMap::new();
    for entry in results {
        let symbol = match entry.get("symbol").and_then(|s| s.as_str()) {
            Some(s) => s.to_string(),
            None => continue,
        };
        let chart = match entry.get("response").and_then(|r| r.get(0)) {
            Some(c) => c,
            None => {
                log::debug!("No chart data for {}", symbol);
                continue;
            }
        };
        history.insert(symbol, parse_chart_bars(chart));
    }

    Ok(history)
}

/// Historische Kurse aus einem Chart-Objekt parsen
fn parse_chart_bars(chart: &serde_json::Value) -> Vec<PriceBar> {
    let timestamps = match chart.get("timestamp").and_then(|t| t.as_array()) {
        Some(t) => t,
        None => return Vec::new(),
    };

    let closes = chart
        .get("indicators")
        .and_then(|i| i.get("quote"))
        .and_then(|q| q.get(0))
        .and_then(|q| q.get("close"))
        .and_then(|c| c.as_array());

    // Adjusted Close für Dividenden-Bereinigung
    let adj_closes = chart
        .get("indicators")
        .and_then(|i| i.get("adjclose"))
        .and_then(|a| a.get(0))
        .and_then(|a| a.get("adjclose"))
        .and_then(|c| c.as_array());

    // Handelstag in der Zeitzone der Börse, nicht in UTC
    let exchange_tz = chart
        .get("meta")
        .and_then(|m| m.get("gmtoffset"))
        .and_then(|o| o.as_i64())
        .and_then(|o| i32::try_from(o).ok())
        .and_then(chrono::FixedOffset::east_opt)
        .unwrap_or(chrono::Utc.fix());

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        let date = match ts
            .as_i64()
            .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
        {
            Some(dt) => dt.with_timezone(&exchange_tz).date_naive(),
            None => continue,
        };

        let close = closes.and_then(|arr| arr.get(i)).and_then(|v| v.as_f64());
        let adj_close = adj_closes.and_then(|arr| arr.get(i)).and_then(|v| v.as_f64());

        if close.is_none() && adj_close.is_none() {
            continue;
        }
        bars.push(PriceBar {
            date,
            close,
            adj_close,
        });
    }

    bars
}
