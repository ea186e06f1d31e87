use crate::error::{ServiceError, ServiceResult};

const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const DEFAULT_CHANNEL_ID: &str = "UCYourChannelIdHere";
const LATEST_VIDEOS_LIMIT: u32 = 4;

/// Read-only adapter over the YouTube Data API for the channel-statistics
/// section of the site.
pub struct ChannelStatsClient {
    api_key: Option<String>,
    channel_id: String,
}

impl ChannelStatsClient {
    pub fn new(api_key: Option<String>, channel_id: Option<String>) -> Self {
        ChannelStatsClient {
            api_key,
            channel_id: channel_id.unwrap_or_else(|| DEFAULT_CHANNEL_ID.to_string()),
        }
    }

    fn api_key(&self) -> ServiceResult<&str> {
        self.api_key.as_deref().ok_or(ServiceError::AdapterNotConfigured)
    }

    async fn fetch_json(&self, url: &str) -> ServiceResult<serde_json::Value> {
        let client = awc::Client::default();
        let mut response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ServiceError::Adapter(format!("YouTube request failed: {}", e)))?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::Adapter(format!("YouTube response was not JSON: {}", e)))
    }

    pub async fn subscriber_count(&self) -> ServiceResult<String> {
        let key = self.api_key()?;
        let url = format!(
            "{}/channels?part=statistics&id={}&key={}",
            YOUTUBE_API_BASE, self.channel_id, key
        );
        let data = self.fetch_json(&url).await?;

        let subscribers = data["items"][0]["statistics"]["subscriberCount"]
            .as_str()
            .unwrap_or("0")
            .to_string();
        Ok(subscribers)
    }

    pub async fn latest_videos(&self) -> ServiceResult<Vec<serde_json::Value>> {
        let key = self.api_key()?;
        let url = format!(
            "{}/search?part=snippet&channelId={}&order=date&maxResults={}&key={}",
            YOUTUBE_API_BASE, self.channel_id, LATEST_VIDEOS_LIMIT, key
        );
        let data = self.fetch_json(&url).await?;

        match data["items"].as_array() {
            Some(items) => Ok(items.clone()),
            None => Ok(Vec::new()),
        }
    }
}
