//! HeartbeatCoalescer: turns per-tick window snapshots into a compact event stream.
//!
//! A changed window appends a fresh zero-length event. An unchanged window
//! periodically replaces the last event with an extended one, at most once per
//! `update_threshold`. A failed read (absent snapshot) is ignored entirely.

use crate::events::{ActivityEvent, WindowSnapshot};
use crate::trace_if_enabled;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Операция над bucket, порождаемая одним тиком
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOperation {
    Append(ActivityEvent),
    ReplaceLast(ActivityEvent),
}

impl fmt::Display for SinkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkOperation::Append(event) => write!(f, "append {}", event),
            SinkOperation::ReplaceLast(event) => write!(f, "replace-last {}", event),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    pub update_threshold: Duration,
    pub exclude_title: bool,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            update_threshold: Duration::from_secs(15),
            exclude_title: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum CoalescerState {
    Empty,
    Tracking {
        snapshot: WindowSnapshot,
        interval_start: DateTime<Utc>,
        last_flush: DateTime<Utc>,
    },
}

pub struct HeartbeatCoalescer {
    config: CoalescerConfig,
    state: CoalescerState,
}

impl HeartbeatCoalescer {
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            state: CoalescerState::Empty,
        }
    }

    /// Обработать один тик. Возвращает не более одной операции для sink.
    pub fn process(
        &mut self,
        snapshot: Option<WindowSnapshot>,
        now: DateTime<Utc>,
    ) -> Option<SinkOperation> {
        let snapshot = snapshot?;
        let snapshot = if self.config.exclude_title {
            snapshot.redacted()
        } else {
            snapshot
        };

        match &mut self.state {
            CoalescerState::Tracking {
                snapshot: current,
                interval_start,
                last_flush,
            } if *current == snapshot => {
                // Отрицательный интервал (часы ушли назад) считаем нулевым
                let since_flush = (now - *last_flush).to_std().unwrap_or(Duration::ZERO);
                if since_flush < self.config.update_threshold {
                    trace_if_enabled!("Окно не изменилось, {:?} с последней отправки", since_flush);
                    return None;
                }

                let duration = (now - *interval_start).to_std().unwrap_or(Duration::ZERO);
                *last_flush = now;
                Some(SinkOperation::ReplaceLast(ActivityEvent::new(
                    *interval_start,
                    duration,
                    current.clone(),
                )))
            }
            _ => {
                let event = ActivityEvent::new(now, Duration::ZERO, snapshot.clone());
                self.state = CoalescerState::Tracking {
                    snapshot,
                    interval_start: now,
                    last_flush: now,
                };
                Some(SinkOperation::Append(event))
            }
        }
    }

    pub fn current(&self) -> Option<&WindowSnapshot> {
        match &self.state {
            CoalescerState::Tracking { snapshot, .. } => Some(snapshot),
            CoalescerState::Empty => None,
        }
    }

    pub fn interval_start(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            CoalescerState::Tracking { interval_start, .. } => Some(*interval_start),
            CoalescerState::Empty => None,
        }
    }

    #[cfg(test)]
    pub fn last_flush(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            CoalescerState::Tracking { last_flush, .. } => Some(*last_flush),
            CoalescerState::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::window::REDACTED_TITLE;
    use crate::services::event_sink::MemorySink;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + chrono::Duration::seconds(secs)
    }

    fn window(app: &str, title: &str) -> Option<WindowSnapshot> {
        Some(WindowSnapshot::new(app, title))
    }

    fn coalescer() -> HeartbeatCoalescer {
        HeartbeatCoalescer::new(CoalescerConfig::default())
    }

    #[test]
    fn test_first_tick_appends_zero_duration() {
        let mut c = coalescer();
        let op = c.process(window("code", "main.rs"), t0());

        assert_eq!(
            op,
            Some(SinkOperation::Append(ActivityEvent::new(
                t0(),
                Duration::ZERO,
                WindowSnapshot::new("code", "main.rs"),
            )))
        );
        assert_eq!(c.interval_start(), Some(t0()));
        assert_eq!(c.last_flush(), Some(t0()));
    }

    #[test]
    fn test_identical_snapshots_below_threshold_append_once() {
        let mut c = coalescer();
        let ops: Vec<_> = (0..14)
            .filter_map(|i| c.process(window("code", "main.rs"), at(i)))
            .collect();

        assert_eq!(ops.len(), 1);
        assert!(matches!(ops[0], SinkOperation::Append(_)));
    }

    #[test]
    fn test_changing_every_tick_appends_every_tick() {
        let mut c = coalescer();
        for i in 0..10 {
            let op = c.process(window("app", &format!("title {}", i)), at(i));
            match op {
                Some(SinkOperation::Append(event)) => {
                    assert_eq!(event.duration, Duration::ZERO);
                    assert_eq!(event.timestamp, at(i));
                }
                other => panic!("ожидался append, получено {:?}", other),
            }
        }
    }

    #[test]
    fn test_long_session_replaces_on_threshold() {
        // poll 1s, threshold 15s, [A] x 20
        let mut c = coalescer();
        let ops: Vec<(i64, SinkOperation)> = (0..20)
            .filter_map(|i| c.process(window("term", "htop"), at(i)).map(|op| (i + 1, op)))
            .collect();

        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].0, 1);
        assert!(matches!(ops[0].1, SinkOperation::Append(_)));

        assert_eq!(ops[1].0, 16);
        assert_eq!(
            ops[1].1,
            SinkOperation::ReplaceLast(ActivityEvent::new(
                t0(),
                Duration::from_secs(15),
                WindowSnapshot::new("term", "htop"),
            ))
        );
        assert_eq!(c.last_flush(), Some(at(15)));
    }

    #[test]
    fn test_change_resets_interval() {
        // [A, A, B, B, B]
        let mut c = coalescer();
        let seq = [
            window("a", "A"),
            window("a", "A"),
            window("b", "B"),
            window("b", "B"),
            window("b", "B"),
        ];
        let ops: Vec<_> = seq
            .into_iter()
            .enumerate()
            .map(|(i, s)| c.process(s, at(i as i64)))
            .collect();

        assert!(matches!(&ops[0], Some(SinkOperation::Append(e)) if e.data.app == "a"));
        assert_eq!(ops[1], None);
        assert!(matches!(&ops[2], Some(SinkOperation::Append(e)) if e.data.app == "b" && e.timestamp == at(2)));
        assert_eq!(ops[3], None);
        assert_eq!(ops[4], None);
        assert_eq!(c.interval_start(), Some(at(2)));
    }

    #[test]
    fn test_absent_snapshot_keeps_state() {
        // [A, A, absent, A]
        let mut c = coalescer();
        assert!(c.process(window("a", "A"), at(0)).is_some());
        assert!(c.process(window("a", "A"), at(1)).is_none());

        let current = c.current().cloned();
        let start = c.interval_start();
        let flush = c.last_flush();

        assert_eq!(c.process(None, at(2)), None);
        assert_eq!(c.current().cloned(), current);
        assert_eq!(c.interval_start(), start);
        assert_eq!(c.last_flush(), flush);

        assert_eq!(c.process(window("a", "A"), at(3)), None);
        assert_eq!(c.interval_start(), Some(at(0)));
    }

    #[test]
    fn test_absent_before_first_snapshot() {
        let mut c = coalescer();
        assert_eq!(c.process(None, t0()), None);
        assert!(c.current().is_none());
        assert!(c.interval_start().is_none());
    }

    #[test]
    fn test_excluded_titles_do_not_trigger_changes() {
        let mut c = HeartbeatCoalescer::new(CoalescerConfig {
            exclude_title: true,
            ..Default::default()
        });

        let first = c.process(window("firefox", "Новости"), at(0));
        match first {
            Some(SinkOperation::Append(event)) => assert_eq!(event.data.title, REDACTED_TITLE),
            other => panic!("ожидался append, получено {:?}", other),
        }

        assert_eq!(c.process(window("firefox", "Почта"), at(1)), None);
        assert_eq!(c.process(window("firefox", "Видео"), at(2)), None);

        // Смена приложения по-прежнему видна
        assert!(matches!(
            c.process(window("code", "main.rs"), at(3)),
            Some(SinkOperation::Append(_))
        ));
    }

    #[test]
    fn test_clock_going_backwards_does_not_replace() {
        let mut c = coalescer();
        c.process(window("a", "A"), at(100));
        assert_eq!(c.process(window("a", "A"), at(50)), None);
        assert_eq!(c.last_flush(), Some(at(100)));
    }

    #[test]
    fn test_zero_threshold_replaces_every_unchanged_tick() {
        let mut c = HeartbeatCoalescer::new(CoalescerConfig {
            update_threshold: Duration::ZERO,
            exclude_title: false,
        });
        c.process(window("a", "A"), at(0));
        for i in 1..5 {
            let op = c.process(window("a", "A"), at(i));
            assert_eq!(
                op,
                Some(SinkOperation::ReplaceLast(ActivityEvent::new(
                    at(0),
                    Duration::from_secs(i as u64),
                    WindowSnapshot::new("a", "A"),
                )))
            );
        }
    }

    #[test]
    fn test_replay_against_memory_sink_has_no_overlaps() {
        let threshold = 3;
        let mut c = HeartbeatCoalescer::new(CoalescerConfig {
            update_threshold: Duration::from_secs(threshold),
            exclude_title: false,
        });
        let sink = MemorySink::new();

        // Детерминированная последовательность с пропусками
        let script: Vec<Option<WindowSnapshot>> = (0..60)
            .map(|i| match i % 17 {
                5 | 11 => None,
                n if n < 9 => window("editor", "notes.md"),
                _ => window("browser", &format!("tab {}", i / 17)),
            })
            .collect();

        let mut applied = 0;
        for (i, snapshot) in script.iter().cloned().enumerate() {
            if let Some(op) = c.process(snapshot, at(i as i64)) {
                sink.apply(&op);
                applied += 1;
            }
        }

        let events = sink.events();
        assert!(applied >= events.len());
        assert!(!events.is_empty());

        // События идут по порядку и не перекрываются
        for pair in events.windows(2) {
            assert!(pair[0].end() <= pair[1].timestamp);
            assert_ne!(pair[0].data, pair[1].data);
        }

        // Каждое событие покрывает время своего окна с точностью до порога
        let covered: Duration = events.iter().map(|e| e.duration).sum();
        let tracked = Duration::from_secs(59);
        let slack = Duration::from_secs((threshold + 1) * events.len() as u64);
        assert!(covered <= tracked);
        assert!(covered + slack >= tracked);
    }
}
