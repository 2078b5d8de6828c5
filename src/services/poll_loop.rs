use crate::{debug_if_enabled, watcher_error};
use crate::error::Result;
use crate::events::WindowSnapshot;
use crate::services::coalescer::{CoalescerConfig, HeartbeatCoalescer, SinkOperation};
use crate::services::event_sink::{apply_operation, EventSink};
use crate::services::window_provider::WindowProvider;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct PollLoopSettings {
    pub bucket_id: String,
    pub poll_interval: Duration,
    pub provider_timeout: Duration,
    pub coalescer: CoalescerConfig,
}

/// Цикл опроса: окно -> коалесцер -> sink, затем пауза poll_interval.
///
/// Пауза отсчитывается после окончания тика (fixed-delay), поэтому медленный
/// провайдер просто растягивает интервал между тиками.
pub struct PollLoop {
    settings: PollLoopSettings,
    provider: Box<dyn WindowProvider>,
    sink: Arc<dyn EventSink>,
    coalescer: HeartbeatCoalescer,
    cancel: CancellationToken,
}

impl PollLoop {
    pub fn new(
        settings: PollLoopSettings,
        provider: Box<dyn WindowProvider>,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> Self {
        let coalescer = HeartbeatCoalescer::new(settings.coalescer.clone());
        Self {
            settings,
            provider,
            sink,
            coalescer,
            cancel,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!(
            "PollLoop запущен: провайдер {}, bucket {}, интервал {:?}, порог обновления {:?}",
            self.provider.name(),
            self.settings.bucket_id,
            self.settings.poll_interval,
            self.settings.coalescer.update_threshold
        );

        loop {
            // Отмена проверяется только между тиками
            if self.cancel.is_cancelled() {
                break;
            }

            self.tick().await;

            tokio::select! {
                _ = sleep(self.settings.poll_interval) => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        match (self.coalescer.current(), self.coalescer.interval_start()) {
            (Some(window), Some(start)) => info!(
                "PollLoop остановлен, последнее окно {} активно с {}",
                window,
                start.to_rfc3339()
            ),
            _ => info!("PollLoop остановлен"),
        }
        Ok(())
    }

    /// Один тик опроса. Возвращает операцию, отправленную в sink (если была).
    pub async fn tick(&mut self) -> Option<SinkOperation> {
        let snapshot = self.poll_window().await;
        let operation = self.coalescer.process(snapshot, Utc::now())?;

        debug_if_enabled!("Операция для bucket {}: {}", self.settings.bucket_id, operation);
        if let Err(e) = apply_operation(self.sink.as_ref(), &self.settings.bucket_id, &operation).await {
            // Следующий тик сам отправит актуальное состояние
            error!("Не удалось отправить событие в bucket {}: {}", self.settings.bucket_id, e);
        }

        Some(operation)
    }

    async fn poll_window(&self) -> Option<WindowSnapshot> {
        match timeout(self.settings.provider_timeout, self.provider.current_window()).await {
            Ok(Ok(Some(window))) => Some(window),
            Ok(Ok(None)) => {
                debug!("Не удалось определить активное окно, повтор на следующем тике");
                None
            }
            Ok(Err(e)) if e.is_provider_error() => {
                warn!("Ошибка получения активного окна через {}: {}", self.provider.name(), e);
                None
            }
            Ok(Err(e)) => {
                error!("Непредвиденная ошибка провайдера {}: {}", self.provider.name(), e);
                None
            }
            Err(_) => {
                let e = watcher_error!(
                    provider_timeout,
                    "{} не ответил за {:?}",
                    self.provider.name(),
                    self.settings.provider_timeout
                );
                warn!("{}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WatcherError;
    use crate::events::ActivityEvent;
    use crate::services::event_sink::MemorySink;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    enum Step {
        Window(&'static str, &'static str),
        Absent,
        Fail,
        Hang,
        Slow(Duration, &'static str),
    }

    /// Провайдер по сценарию; по окончании сценария отменяет цикл
    struct ScriptedProvider {
        steps: Mutex<VecDeque<Step>>,
        calls: Mutex<Vec<Instant>>,
        cancel: CancellationToken,
    }

    impl ScriptedProvider {
        fn new(steps: Vec<Step>, cancel: CancellationToken) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: Mutex::new(Vec::new()),
                cancel,
            })
        }
    }

    #[async_trait::async_trait]
    impl WindowProvider for Arc<ScriptedProvider> {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn current_window(&self) -> Result<Option<WindowSnapshot>> {
            self.calls.lock().push(Instant::now());
            let step = self.steps.lock().pop_front();
            match step {
                Some(Step::Window(app, title)) => Ok(Some(WindowSnapshot::new(app, title))),
                Some(Step::Absent) => Ok(None),
                Some(Step::Fail) => WatcherError::provider_unavailable("xprop упал"),
                Some(Step::Hang) => {
                    std::future::pending::<()>().await;
                    Ok(None)
                }
                Some(Step::Slow(delay, app)) => {
                    sleep(delay).await;
                    Ok(Some(WindowSnapshot::new(app, app)))
                }
                None => {
                    self.cancel.cancel();
                    Ok(None)
                }
            }
        }
    }

    /// Sink, который всегда падает, но считает попытки
    #[derive(Default)]
    struct FailingSink {
        attempts: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl EventSink for FailingSink {
        async fn ensure_bucket(&self, _bucket_id: &str, _event_type: &str) -> Result<()> {
            Ok(())
        }

        async fn append_event(&self, _bucket_id: &str, _event: &ActivityEvent) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(WatcherError::SinkUnavailable("connection refused".to_string()))
        }

        async fn replace_last_event(&self, _bucket_id: &str, _event: &ActivityEvent) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(WatcherError::SinkUnavailable("connection refused".to_string()))
        }
    }

    fn settings() -> PollLoopSettings {
        PollLoopSettings {
            bucket_id: "test-bucket".to_string(),
            poll_interval: Duration::from_secs(1),
            provider_timeout: Duration::from_secs(5),
            coalescer: CoalescerConfig::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_and_timeouts_are_skipped() {
        let cancel = CancellationToken::new();
        let provider = ScriptedProvider::new(
            vec![
                Step::Window("a", "A"),
                Step::Window("a", "A"),
                Step::Fail,
                Step::Absent,
                Step::Hang,
                Step::Window("a", "A"),
                Step::Window("b", "B"),
                Step::Window("b", "B"),
            ],
            cancel.clone(),
        );
        let sink = Arc::new(MemorySink::new());

        let poll_loop = PollLoop::new(settings(), Box::new(provider.clone()), sink.clone(), cancel);
        poll_loop.run().await.unwrap();

        let apps: Vec<String> = sink.events().into_iter().map(|e| e.data.app).collect();
        assert_eq!(apps, vec!["a".to_string(), "b".to_string()]);
        // Все 8 шагов + вызов, завершивший сценарий
        assert_eq!(provider.calls.lock().len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_errors_do_not_stop_loop() {
        let cancel = CancellationToken::new();
        let provider = ScriptedProvider::new(
            vec![Step::Window("a", "A"), Step::Window("b", "B"), Step::Window("c", "C")],
            cancel.clone(),
        );
        let sink = Arc::new(FailingSink::default());

        let poll_loop = PollLoop::new(settings(), Box::new(provider.clone()), sink.clone(), cancel);
        poll_loop.run().await.unwrap();

        assert_eq!(sink.attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_never_polls() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let provider = ScriptedProvider::new(vec![Step::Window("a", "A")], cancel.clone());

        let poll_loop = PollLoop::new(settings(), Box::new(provider.clone()), Arc::new(MemorySink::new()), cancel);
        poll_loop.run().await.unwrap();

        assert!(provider.calls.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_ticks() {
        let cancel = CancellationToken::new();
        let slow = Duration::from_millis(500);
        let provider = ScriptedProvider::new(
            vec![Step::Slow(slow, "a"), Step::Slow(slow, "a"), Step::Slow(slow, "a")],
            cancel.clone(),
        );

        let poll_loop = PollLoop::new(settings(), Box::new(provider.clone()), Arc::new(MemorySink::new()), cancel);
        poll_loop.run().await.unwrap();

        let calls = provider.calls.lock().clone();
        assert_eq!(calls.len(), 4);
        for pair in calls.windows(2) {
            // 500ms работы провайдера + 1s паузы после тика
            assert_eq!(pair[1] - pair[0], Duration::from_millis(1500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_reports_operation() {
        let cancel = CancellationToken::new();
        let provider = ScriptedProvider::new(vec![Step::Window("a", "A"), Step::Window("a", "A")], cancel.clone());
        let sink = Arc::new(MemorySink::new());
        let mut poll_loop = PollLoop::new(settings(), Box::new(provider), sink.clone(), cancel);

        assert!(matches!(poll_loop.tick().await, Some(SinkOperation::Append(_))));
        assert_eq!(poll_loop.tick().await, None);
        assert_eq!(sink.events().len(), 1);
    }
}
