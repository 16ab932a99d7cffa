use crate::{config::ProviderConfig, errors::AppError};
use serde_json::Value;
use std::time::Duration;

const DETAIL_PATH: &str = "/v1/social/youtube/detail";

/// Client for the paid media-extraction API.
///
/// The detail call carries the full timeout budget; media relays only get a
/// connect timeout so long transfers are not cut off mid-body.
pub struct Provider {
    client: reqwest::Client,
    media_client: reqwest::Client,
    host: String,
    api_key: String,
}

impl Provider {
    pub fn from_env(config: &ProviderConfig) -> anyhow::Result<Self> {
        let api_key = match std::env::var("RAPIDAPI_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => anyhow::bail!("RAPIDAPI_KEY is not set"),
        };

        let timeout = Duration::from_secs(config.timeout_secs);

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let media_client = reqwest::Client::builder().connect_timeout(timeout).build()?;

        Ok(Self {
            client,
            media_client,
            host: config.host.clone(),
            api_key,
        })
    }

    /// Ask the provider for the details of a video page url.
    pub async fn video_detail(&self, url: &str) -> Result<Value, AppError> {
        let resp = self
            .client
            .post(format!("https://{}{}", self.host, DETAIL_PATH))
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", &self.host)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        Ok(resp)
    }

    /// Resolve a video page url to the provider's first offered stream url.
    pub async fn resolve_stream_url(&self, url: &str) -> Result<String, AppError> {
        let detail = self.video_detail(url).await?;

        extract_stream_url(&detail)
            .map(str::to_owned)
            .ok_or(AppError::NoDownloadUrl)
    }

    /// Open the stream itself for relaying.
    pub async fn fetch_stream(&self, stream_url: &str) -> Result<reqwest::Response, AppError> {
        let resp = self
            .media_client
            .get(stream_url)
            .send()
            .await?
            .error_for_status()?;

        Ok(resp)
    }
}

/// First offered stream wins; the provider's ordering is taken as-is.
/// Any missing piece of the expected shape yields `None`, never a panic.
pub fn extract_stream_url(resp: &Value) -> Option<&str> {
    resp.get("streamingData")
        .and_then(|sd| sd.get("formats"))
        .and_then(|formats| formats.as_array())
        .and_then(|formats| formats.first())
        .and_then(|format| format.get("url"))
        .and_then(|url| url.as_str())
}
