use crate::error::Result;
use crate::events::ActivityEvent;
use crate::services::coalescer::SinkOperation;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tracing::{info, warn};

use super::r#trait::EventSink;

/// Сколько последних событий хранит dry-run sink
const DRY_RUN_RETAINED_EVENTS: usize = 1;

/// Sink в памяти с точной семантикой append / replace-last.
/// Используется в dry-run режиме и в тестах.
pub struct MemorySink {
    events: Mutex<VecDeque<ActivityEvent>>,
    buckets: Mutex<HashSet<String>>,
    log_operations: bool,
    // None: хранить всё (тесты)
    retained: Option<usize>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            buckets: Mutex::new(HashSet::new()),
            log_operations: false,
            retained: None,
        }
    }

    /// Вариант для dry-run: каждая операция пишется в лог, в памяти
    /// остаётся только последнее событие
    pub fn logging() -> Self {
        Self {
            log_operations: true,
            retained: Some(DRY_RUN_RETAINED_EVENTS),
            ..Self::new()
        }
    }

    pub fn apply(&self, operation: &SinkOperation) {
        if self.log_operations {
            info!("[DRY RUN] {}", operation);
        }

        let mut events = self.events.lock();
        match operation {
            SinkOperation::Append(event) => events.push_back(event.clone()),
            SinkOperation::ReplaceLast(event) => match events.back_mut() {
                Some(last) => *last = event.clone(),
                None => {
                    warn!("replace-last для пустого bucket, событие добавлено");
                    events.push_back(event.clone());
                }
            },
        }

        if let Some(retained) = self.retained {
            while events.len() > retained {
                events.pop_front();
            }
        }
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn has_bucket(&self, bucket_id: &str) -> bool {
        self.buckets.lock().contains(bucket_id)
    }

    fn check_bucket(&self, bucket_id: &str) {
        if self.log_operations && !self.buckets.lock().contains(bucket_id) {
            warn!("[DRY RUN] Bucket {} не был создан", bucket_id);
        }
    }
}

#[async_trait::async_trait]
impl EventSink for MemorySink {
    async fn ensure_bucket(&self, bucket_id: &str, event_type: &str) -> Result<()> {
        if self.log_operations {
            info!("[DRY RUN] Bucket {} (тип {})", bucket_id, event_type);
        }
        self.buckets.lock().insert(bucket_id.to_string());
        Ok(())
    }

    async fn append_event(&self, bucket_id: &str, event: &ActivityEvent) -> Result<()> {
        self.check_bucket(bucket_id);
        self.apply(&SinkOperation::Append(event.clone()));
        Ok(())
    }

    async fn replace_last_event(&self, bucket_id: &str, event: &ActivityEvent) -> Result<()> {
        self.check_bucket(bucket_id);
        self.apply(&SinkOperation::ReplaceLast(event.clone()));
        Ok(())
    }
}
