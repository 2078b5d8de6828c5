use crate::config::{Config, CLIENT_NAME};
use crate::{debug_if_enabled, watcher_error};
use crate::error::{Result, WatcherError};
use crate::events::ActivityEvent;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use super::r#trait::EventSink;

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Sink поверх REST API сервера активности (`/api/0/buckets/...`)
pub struct HttpEventSink {
    client: Client,
    base_url: Url,
    hostname: String,
    pulsetime: f64,
    // bucket -> event type, чтобы пересоздать bucket после 404
    known_buckets: Mutex<HashMap<String, String>>,
}

impl HttpEventSink {
    pub fn new(config: &Config, hostname: &str) -> Result<Self> {
        let server_url = config.server_url();
        let base_url = Url::parse(&server_url)
            .map_err(|e| WatcherError::Internal(format!("Неверный адрес сервера {}: {}", server_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        info!("HttpEventSink: сервер {}, pulsetime {}s", base_url, config.pulsetime());

        Ok(Self {
            client,
            base_url,
            hostname: hostname.to_string(),
            pulsetime: config.pulsetime(),
            known_buckets: Mutex::new(HashMap::new()),
        })
    }

    fn bucket_url(&self, bucket_id: &str, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| WatcherError::Internal(format!("Адрес {} не может быть базовым", self.base_url)))?
            .clear()
            .extend(["api", "0", "buckets", bucket_id])
            .extend(tail);
        Ok(url)
    }

    fn heartbeat_url(&self, bucket_id: &str) -> Result<Url> {
        let mut url = self.bucket_url(bucket_id, &["heartbeat"])?;
        url.query_pairs_mut()
            .append_pair("pulsetime", &self.pulsetime.to_string());
        Ok(url)
    }

    async fn post<T: Serialize + ?Sized>(&self, url: Url, body: &T) -> Result<StatusCode> {
        debug_if_enabled!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        Ok(response.status())
    }

    async fn create_bucket(&self, bucket_id: &str, event_type: &str) -> Result<()> {
        let url = self.bucket_url(bucket_id, &[])?;
        let body = json!({
            "client": CLIENT_NAME,
            "type": event_type,
            "hostname": self.hostname,
        });

        let status = self.post(url, &body).await?;
        // 304 означает, что bucket уже существует
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            Ok(())
        } else {
            Err(watcher_error!(sink_unavailable, "Не удалось создать bucket {}: HTTP {}", bucket_id, status))
        }
    }

    /// POST с одной повторной попыткой после пересоздания bucket
    async fn post_event<T: Serialize + ?Sized>(&self, bucket_id: &str, url: Url, body: &T) -> Result<()> {
        let status = self.post(url.clone(), body).await?;
        if status.is_success() {
            return Ok(());
        }

        let event_type = self.known_buckets.lock().get(bucket_id).cloned();
        match (status, event_type) {
            (StatusCode::NOT_FOUND, Some(event_type)) => {
                warn!("Bucket {} не найден на сервере, создаём заново", bucket_id);
                self.create_bucket(bucket_id, &event_type).await?;
                let status = self.post(url, body).await?;
                if status.is_success() {
                    Ok(())
                } else {
                    Err(watcher_error!(sink_unavailable, "HTTP {} для bucket {}", status, bucket_id))
                }
            }
            (status, _) => Err(watcher_error!(sink_unavailable, "HTTP {} для bucket {}", status, bucket_id)),
        }
    }
}

#[async_trait::async_trait]
impl EventSink for HttpEventSink {
    async fn ensure_bucket(&self, bucket_id: &str, event_type: &str) -> Result<()> {
        // Запоминаем bucket даже при ошибке: сервер может подняться позже
        self.known_buckets
            .lock()
            .insert(bucket_id.to_string(), event_type.to_string());

        self.create_bucket(bucket_id, event_type).await?;
        info!("Bucket {} готов (тип {})", bucket_id, event_type);
        Ok(())
    }

    async fn append_event(&self, bucket_id: &str, event: &ActivityEvent) -> Result<()> {
        let url = self.bucket_url(bucket_id, &["events"])?;
        self.post_event(bucket_id, url, std::slice::from_ref(event)).await
    }

    async fn replace_last_event(&self, bucket_id: &str, event: &ActivityEvent) -> Result<()> {
        let url = self.heartbeat_url(bucket_id)?;
        self.post_event(bucket_id, url, event).await
    }
}
