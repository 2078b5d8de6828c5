use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Значение для полей, которые не удалось определить
pub const UNKNOWN: &str = "unknown";

/// Заголовок, подставляемый вместо настоящего при exclude_title
pub const REDACTED_TITLE: &str = "excluded";

/// Снимок активного окна за один тик опроса
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub app: String,
    pub title: String,
}

impl WindowSnapshot {
    pub fn new(app: impl Into<String>, title: impl Into<String>) -> Self {
        let app = app.into();
        let title = title.into();
        Self {
            app: if app.trim().is_empty() { UNKNOWN.to_string() } else { app },
            title: if title.trim().is_empty() { UNKNOWN.to_string() } else { title },
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.app == UNKNOWN && self.title == UNKNOWN
    }

    /// Копия снимка со скрытым заголовком
    pub fn redacted(mut self) -> Self {
        self.title = REDACTED_TITLE.to_string();
        self
    }
}

impl fmt::Display for WindowSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\" ({})", self.title, self.app)
    }
}

/// Событие активности, отправляемое в bucket сервера.
///
/// Формат на проводе: `{"timestamp", "duration" (секунды), "data": {"app", "title"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub data: WindowSnapshot,
}

impl ActivityEvent {
    pub fn new(timestamp: DateTime<Utc>, duration: Duration, data: WindowSnapshot) -> Self {
        Self {
            timestamp,
            duration,
            data,
        }
    }

    /// Момент окончания интервала события
    #[cfg(test)]
    pub fn end(&self) -> DateTime<Utc> {
        match chrono::Duration::from_std(self.duration) {
            Ok(duration) => self.timestamp + duration,
            Err(_) => DateTime::<Utc>::MAX_UTC,
        }
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} ({:.1}s)",
            self.data,
            self.timestamp.to_rfc3339(),
            self.duration.as_secs_f64()
        )
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
