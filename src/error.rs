use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ошибка JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Провайдер окна недоступен: {0}")]
    ProviderUnavailable(String),

    #[error("Таймаут провайдера окна: {0}")]
    ProviderTimeout(String),

    #[error("Сервер событий недоступен: {0}")]
    SinkUnavailable(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

impl WatcherError {
    pub fn provider_unavailable<T>(msg: impl Into<String>) -> Result<T> {
        Err(WatcherError::ProviderUnavailable(msg.into()))
    }

    /// Ошибки, после которых тик просто пропускается
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            WatcherError::ProviderUnavailable(_) | WatcherError::ProviderTimeout(_) | WatcherError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WatcherError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! watcher_error {
    (provider_unavailable, $($arg:tt)*) => {
        $crate::error::WatcherError::ProviderUnavailable(format!($($arg)*))
    };
    (provider_timeout, $($arg:tt)*) => {
        $crate::error::WatcherError::ProviderTimeout(format!($($arg)*))
    };
    (sink_unavailable, $($arg:tt)*) => {
        $crate::error::WatcherError::SinkUnavailable(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::WatcherError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_are_recoverable() {
        assert!(watcher_error!(provider_timeout, "xprop > {}s", 5).is_provider_error());
        assert!(WatcherError::provider_unavailable::<()>("нет окна").unwrap_err().is_provider_error());
        assert!(!watcher_error!(sink_unavailable, "HTTP {}", 500).is_provider_error());
    }

    #[test]
    fn test_error_messages() {
        let err = watcher_error!(internal, "сломалось: {}", 42);
        assert_eq!(err.to_string(), "Внутренняя ошибка: сломалось: 42");
    }
}
