//! Hosted provider metadata
//!
//! One bounded request per instance tells the resolver whether the hosted
//! provider is reachable. The payload also carries the stream duration as an
//! ISO-8601 string (`PT1M30S`), used when the widget cannot report one yet.

use crate::{Error, Result};
use async_trait::async_trait;
use nom::{
    character::complete::char,
    combinator::{all_consuming, opt},
    number::complete::double,
    sequence::{preceded, terminated},
    IResult, Parser,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Metadata for one hosted stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    /// Stream id the metadata belongs to
    pub id: String,
    /// Duration in seconds, when the provider knows it
    pub duration: Option<f64>,
}

/// Source of hosted stream metadata
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch metadata for a stream id
    async fn fetch(&self, stream_id: &str) -> Result<StreamMetadata>;
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    #[serde(default)]
    items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataItem {
    id: String,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

/// Metadata provider speaking to an HTTP endpoint (`<endpoint>?id=<stream>`)
pub struct HttpMetadataProvider {
    client: Client,
    endpoint: Url,
}

impl HttpMetadataProvider {
    /// Create a provider for an endpoint
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    fn request_url(&self, stream_id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id", stream_id);
        url
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    #[instrument(skip(self))]
    async fn fetch(&self, stream_id: &str) -> Result<StreamMetadata> {
        let url = self.request_url(stream_id);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()
            .map_err(|e| Error::MetadataFetch(format!("{url}: {e}")))?;

        let body = response.text().await?;
        let metadata = parse_metadata_response(stream_id, &body)?;

        debug!(stream = stream_id, duration = ?metadata.duration, "Stream metadata received");

        Ok(metadata)
    }
}

/// Parse the provider's JSON body
///
/// An empty `items` list is still a successful answer; only the duration is
/// missing then.
pub fn parse_metadata_response(stream_id: &str, body: &str) -> Result<StreamMetadata> {
    let response: MetadataResponse =
        serde_json::from_str(body).map_err(|e| Error::MetadataParse(e.to_string()))?;

    let Some(item) = response.items.into_iter().next() else {
        return Ok(StreamMetadata {
            id: stream_id.to_string(),
            duration: None,
        });
    };

    let duration = item
        .content_details
        .and_then(|details| details.duration)
        .and_then(|raw| parse_iso_duration(&raw));

    Ok(StreamMetadata {
        id: item.id,
        duration,
    })
}

fn iso_duration(input: &str) -> IResult<&str, f64> {
    let (input, _) = char('P').parse(input)?;
    let (input, days) = opt(terminated(double, char('D'))).parse(input)?;
    let (input, time) = opt(preceded(
        char('T'),
        (
            opt(terminated(double, char('H'))),
            opt(terminated(double, char('M'))),
            opt(terminated(double, char('S'))),
        ),
    ))
    .parse(input)?;

    let (hours, minutes, seconds) = time.unwrap_or((None, None, None));
    let total = days.unwrap_or(0.0) * 86_400.0
        + hours.unwrap_or(0.0) * 3_600.0
        + minutes.unwrap_or(0.0) * 60.0
        + seconds.unwrap_or(0.0);

    Ok((input, total))
}

/// Parse an ISO-8601 duration (`PT1H2M3S`, `P1DT30M`) into seconds
pub fn parse_iso_duration(raw: &str) -> Option<f64> {
    all_consuming(iso_duration)
        .parse(raw.trim())
        .ok()
        .map(|(_, seconds)| seconds)
        .filter(|seconds| seconds.is_finite())
}
