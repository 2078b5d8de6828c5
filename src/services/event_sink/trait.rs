use crate::config::Config;
use crate::error::Result;
use crate::events::ActivityEvent;
use crate::services::coalescer::SinkOperation;
use std::sync::Arc;

use super::{HttpEventSink, MemorySink};

/// Хранилище событий, разбитое на bucket'ы
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Создать bucket, если его ещё нет
    async fn ensure_bucket(&self, bucket_id: &str, event_type: &str) -> Result<()>;

    /// Добавить новое событие в конец bucket
    async fn append_event(&self, bucket_id: &str, event: &ActivityEvent) -> Result<()>;

    /// Заменить последнее добавленное событие
    async fn replace_last_event(&self, bucket_id: &str, event: &ActivityEvent) -> Result<()>;
}

/// Применить операцию коалесцера к sink
pub async fn apply_operation(
    sink: &dyn EventSink,
    bucket_id: &str,
    operation: &SinkOperation,
) -> Result<()> {
    match operation {
        SinkOperation::Append(event) => sink.append_event(bucket_id, event).await,
        SinkOperation::ReplaceLast(event) => sink.replace_last_event(bucket_id, event).await,
    }
}

/// Factory function to create an appropriate event sink based on the dry_run flag
pub fn create_event_sink(
    config: &Config,
    hostname: &str,
    dry_run: bool,
) -> Result<Arc<dyn EventSink>> {
    if dry_run {
        Ok(Arc::new(MemorySink::logging()))
    } else {
        Ok(Arc::new(HttpEventSink::new(config, hostname)?))
    }
}
