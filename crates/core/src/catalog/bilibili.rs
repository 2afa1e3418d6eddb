//! Bilibili favorites client.
//!
//! Lists a favorites folder through the public medialist endpoint. A
//! response counts as successful only with HTTP 200 and `code == 0`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::types::{MediaDescriptor, MediaStats};
use super::{Catalog, CatalogConfig, CatalogError};
use crate::backoff::Escalate;

/// Bilibili favorites folder client.
pub struct BilibiliFavorites {
    client: Client,
    config: CatalogConfig,
}

impl BilibiliFavorites {
    /// Create a new client.
    pub fn new(config: CatalogConfig) -> Result<Self, CatalogError> {
        if config.favorites_id.trim().is_empty() {
            return Err(CatalogError::NotConfigured(
                "catalog.favorites_id is empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let referer = HeaderValue::from_str(&config.referer)
            .map_err(|e| CatalogError::NotConfigured(format!("invalid referer: {}", e)))?;
        headers.insert(REFERER, referer.clone());
        headers.insert(ORIGIN, referer);

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    fn list_url(&self) -> String {
        format!(
            "{}/x/v1/medialist/resource/list?type=3&biz_id={}&ps={}",
            self.config.base_url.trim_end_matches('/'),
            self.config.favorites_id,
            self.config.page_size
        )
    }

    /// One request with the given timeout.
    async fn fetch_once(&self, timeout: Duration) -> Result<Vec<MediaDescriptor>, CatalogError> {
        let response = self
            .client
            .get(self.list_url())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| classify(e, timeout))?;
        let parsed: ListResponse = serde_json::from_str(&body)
            .map_err(|e| CatalogError::Parse(format!("invalid JSON: {}", e)))?;

        if status.as_u16() != 200 || parsed.code != 0 {
            return Err(CatalogError::Api {
                status: status.as_u16(),
                code: parsed.code,
                message: parsed.message,
            });
        }

        let entries = parsed.data.and_then(|d| d.media_list).unwrap_or_default();
        Ok(into_descriptors(entries))
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> CatalogError {
    if error.is_timeout() {
        CatalogError::Timeout {
            timeout_secs: timeout.as_secs_f64(),
        }
    } else {
        CatalogError::Http(error)
    }
}

#[async_trait]
impl Catalog for BilibiliFavorites {
    async fn fetch(&self) -> Result<Vec<MediaDescriptor>, CatalogError> {
        let policy = self.config.backoff;
        let max_retries = self.config.max_retries.max(1);
        let mut timeout = Duration::from_secs(self.config.timeout_secs);
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            match self.fetch_once(timeout).await {
                Ok(descriptors) => {
                    info!(
                        favorites_id = %self.config.favorites_id,
                        count = descriptors.len(),
                        attempt,
                        "Fetched favorites"
                    );
                    return Ok(descriptors);
                }
                Err(e) => {
                    warn!(
                        favorites_id = %self.config.favorites_id,
                        attempt,
                        max_retries,
                        error = %e,
                        "Favorites fetch failed"
                    );
                    if matches!(e, CatalogError::Timeout { .. }) {
                        timeout.escalate(&policy);
                    }
                    last_error = e.to_string();
                }
            }

            if attempt < max_retries {
                let wait = policy.wait(attempt);
                debug!(attempt, wait_ms = wait.as_millis() as u64, "Waiting before retry");
                sleep(wait).await;
            }
        }

        Err(CatalogError::RetryExhausted {
            attempts: max_retries,
            last_error,
        })
    }
}

/// Converts raw entries into descriptors, dropping entries without an id.
fn into_descriptors(entries: Vec<RawMedia>) -> Vec<MediaDescriptor> {
    entries
        .into_iter()
        .filter_map(|raw| {
            let id = raw
                .bv_id
                .or(raw.bvid)
                .filter(|id| !id.trim().is_empty());
            let Some(id) = id else {
                warn!(title = ?raw.title, "Skipping favorites entry without video id");
                return None;
            };

            let mut descriptor = MediaDescriptor::new(id, raw.title.unwrap_or_default());
            descriptor.duration_secs = raw.duration;
            descriptor.published_at = DateTime::from_timestamp(raw.pubtime, 0);
            descriptor.cover_url = raw.cover.filter(|c| !c.is_empty());
            descriptor.stats = raw.cnt_info.into();
            Some(descriptor)
        })
        .collect()
}

// ============================================================================
// API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListResponse {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<ListData>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(rename = "mediaList", alias = "media_list")]
    media_list: Option<Vec<RawMedia>>,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    bv_id: Option<String>,
    bvid: Option<String>,
    title: Option<String>,
    cover: Option<String>,
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    pubtime: i64,
    #[serde(default)]
    cnt_info: RawCounters,
}

#[derive(Debug, Default, Deserialize)]
struct RawCounters {
    #[serde(default)]
    play: u64,
    #[serde(default)]
    coin: u64,
    #[serde(default)]
    reply: u64,
    #[serde(default)]
    share: u64,
    #[serde(default)]
    danmaku: u64,
    #[serde(default)]
    collect: u64,
    #[serde(default)]
    thumb_up: u64,
}

impl From<RawCounters> for MediaStats {
    fn from(raw: RawCounters) -> Self {
        Self {
            play: raw.play,
            coin: raw.coin,
            reply: raw.reply,
            share: raw.share,
            danmaku: raw.danmaku,
            collect: raw.collect,
            thumb_up: raw.thumb_up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const SAMPLE: &str = r#"{
        "code": 0,
        "message": "0",
        "data": {
            "mediaList": [
                {
                    "bv_id": "BV1xx411c7mD",
                    "title": "【MV】Song: Live?",
                    "cover": "http://i0.hdslb.com/cover.jpg",
                    "duration": 245,
                    "pubtime": 1600000000,
                    "cnt_info": {"play": 10, "coin": 2, "thumb_up": 5}
                },
                {"title": "no id"},
                {"bv_id": "BV1yy411c7mE"}
            ]
        }
    }"#;

    #[test]
    fn test_parse_sample_response() {
        let parsed: ListResponse = serde_json::from_str(SAMPLE).unwrap();
        let descriptors = into_descriptors(parsed.data.unwrap().media_list.unwrap());

        assert_eq!(descriptors.len(), 2);
        let first = &descriptors[0];
        assert_eq!(first.id, "BV1xx411c7mD");
        assert_eq!(first.title, "【MV】Song Live");
        assert_eq!(first.duration_display(), "00:04:05");
        assert_eq!(first.stats.play, 10);
        assert_eq!(first.stats.share, 0);
        assert!(first.published_at.is_some());

        assert_eq!(descriptors[1].title, crate::catalog::UNKNOWN_TITLE);
        assert_eq!(descriptors[1].cover_url, None);
    }

    #[test]
    fn test_parse_empty_list() {
        let parsed: ListResponse =
            serde_json::from_str(r#"{"code":0,"message":"0","data":{"mediaList":null}}"#).unwrap();
        assert!(parsed.data.unwrap().media_list.is_none());
    }

    #[test]
    fn test_new_requires_favorites_id() {
        let result = BilibiliFavorites::new(CatalogConfig::default());
        assert!(matches!(result, Err(CatalogError::NotConfigured(_))));
    }

    /// Serves `body` to every connection with the given status line.
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    fn fast_config(base_url: String) -> CatalogConfig {
        CatalogConfig::for_favorites("42")
            .with_base_url(base_url)
            .with_max_retries(2)
            .with_backoff(BackoffPolicy::new(1.0, 0.0, 1.0, 5.0))
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let base = serve("200 OK", SAMPLE).await;
        let client = BilibiliFavorites::new(fast_config(base)).unwrap();
        let descriptors = client.fetch().await.unwrap();
        assert_eq!(descriptors.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_api_code_exhausts_retries() {
        let base = serve("200 OK", r#"{"code":-400,"message":"bad request"}"#).await;
        let client = BilibiliFavorites::new(fast_config(base)).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::RetryExhausted { attempts: 2, .. }
        ));
    }
}
