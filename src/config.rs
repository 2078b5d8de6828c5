use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Порт aw-server по умолчанию и в тестовом режиме
pub const DEFAULT_PORT: u16 = 5600;
pub const TESTING_PORT: u16 = 5666;

pub const CLIENT_NAME: &str = "aw-watcher-window";
pub const EVENT_TYPE: &str = "currentwindow";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatcherConfig {
    /// Интервал опроса окна, секунды
    pub poll_time: f64,
    /// Минимальный интервал между продлениями события, секунды
    pub update_time: f64,
    pub exclude_title: bool,
    pub provider_timeout: f64,
    pub detection_method: DetectionMethod,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    pub testing: bool,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub pulsetime: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Auto,
    Xprop,
    Xdotool,
    Kdotool,
    Wmctrl,
    Sway,
}

/// Значения из командной строки, перекрывающие файл и окружение
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub poll_time: Option<f64>,
    pub update_time: Option<f64>,
    pub exclude_title: bool,
    pub detection_method: Option<DetectionMethod>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub testing: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_time: 1.0,
            update_time: 15.0,
            exclude_title: false,
            provider_timeout: 5.0,
            detection_method: DetectionMethod::Auto,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
            testing: false,
            bucket: None,
            pulsetime: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P, overrides: &ConfigOverrides) -> Result<Self> {
        let config_path = config_path.as_ref();

        // Отсутствующий файл не ошибка: Toml::file просто ничего не добавит
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("WINDOW_WATCHER_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.apply_overrides(overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(poll_time) = overrides.poll_time {
            self.watcher.poll_time = poll_time;
        }
        if let Some(update_time) = overrides.update_time {
            self.watcher.update_time = update_time;
        }
        if overrides.exclude_title {
            self.watcher.exclude_title = true;
        }
        if let Some(method) = overrides.detection_method {
            self.watcher.detection_method = method;
        }
        if let Some(host) = &overrides.host {
            self.server.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
        if overrides.testing {
            self.server.testing = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация интервалов
        let watcher = &self.watcher;
        if !watcher.poll_time.is_finite() || watcher.poll_time <= 0.0 {
            anyhow::bail!("poll_time должно быть больше 0, получено {}", watcher.poll_time);
        }

        if !watcher.update_time.is_finite() || watcher.update_time < 0.0 {
            anyhow::bail!("update_time не может быть отрицательным, получено {}", watcher.update_time);
        }

        if !watcher.provider_timeout.is_finite() || watcher.provider_timeout <= 0.0 {
            anyhow::bail!("provider_timeout должно быть больше 0, получено {}", watcher.provider_timeout);
        }

        // Значения должны помещаться в Duration, иначе аксессоры ниже упадут
        for (name, value) in [
            ("poll_time", watcher.poll_time),
            ("update_time", watcher.update_time),
            ("provider_timeout", watcher.provider_timeout),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                anyhow::bail!("{} слишком велико: {}", name, value);
            }
        }

        // Валидация сервера
        if self.server.host.trim().is_empty() {
            anyhow::bail!("server.host не может быть пустым");
        }

        if let Some(bucket) = &self.server.bucket {
            if bucket.trim().is_empty() {
                anyhow::bail!("server.bucket не может быть пустым");
            }
        }

        if let Some(pulsetime) = self.server.pulsetime {
            if !pulsetime.is_finite() || pulsetime < 0.0 {
                anyhow::bail!("pulsetime не может быть отрицательным, получено {}", pulsetime);
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.watcher.poll_time)
    }

    pub fn update_threshold(&self) -> Duration {
        Duration::from_secs_f64(self.watcher.update_time)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.watcher.provider_timeout)
    }

    /// Порог серверного слияния heartbeat, секунды
    pub fn pulsetime(&self) -> f64 {
        self.server
            .pulsetime
            .unwrap_or(self.watcher.update_time + self.watcher.poll_time)
    }

    pub fn port(&self) -> u16 {
        match self.server.port {
            Some(port) => port,
            None if self.server.testing => TESTING_PORT,
            None => DEFAULT_PORT,
        }
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server.host, self.port())
    }

    pub fn bucket_id(&self, hostname: &str) -> String {
        self.server
            .bucket
            .clone()
            .unwrap_or_else(|| format!("{}_{}", CLIENT_NAME, hostname))
    }
}
