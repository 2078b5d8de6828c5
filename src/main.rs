use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::{Config, ConfigOverrides, DetectionMethod, LoggingConfig, EVENT_TYPE};
use services::{
    create_event_sink,
    create_window_provider,
    CoalescerConfig,
    PollLoop,
    PollLoopSettings,
};

const PARENT_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "window-watcher")]
#[command(about = "Наблюдатель активного окна для локального сервера событий")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "window-watcher.toml")]
    config: String,

    /// Тестовый режим (сервер на тестовом порту)
    #[arg(long)]
    testing: bool,

    /// Интервал опроса окна, секунды
    #[arg(long)]
    poll_time: Option<f64>,

    /// Минимальный интервал между продлениями события, секунды
    #[arg(long)]
    update_time: Option<f64>,

    /// Не отправлять заголовки окон
    #[arg(long)]
    exclude_title: bool,

    /// Адрес сервера событий
    #[arg(long)]
    host: Option<String>,

    /// Порт сервера событий
    #[arg(long)]
    port: Option<u16>,

    /// Метод определения активного окна
    #[arg(long, value_enum)]
    method: Option<DetectionMethod>,

    /// Режим сухого запуска (эмуляция окон, события только в лог)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования
    #[arg(long)]
    log_level: Option<String>,

    /// Не завершаться при смерти родительского процесса
    #[arg(long)]
    no_parent_watch: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            poll_time: self.poll_time,
            update_time: self.update_time,
            exclude_title: self.exclude_title,
            detection_method: self.method,
            host: self.host.clone(),
            port: self.port,
            testing: self.testing,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации (до логирования: уровень берётся из неё)
    let config = Config::load(&args.config, &args.overrides())?;

    // Инициализация системы логирования
    init_tracing(&config.logging)?;

    info!("Запуск window-watcher v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - сервер событий не используется");
    }

    utils::environment::check_environment();

    let hostname = utils::hostname();
    let bucket_id = config.bucket_id(&hostname);

    // Инициализация компонентов
    let sink = create_event_sink(&config, &hostname, args.dry_run)?;
    if let Err(e) = sink.ensure_bucket(&bucket_id, EVENT_TYPE).await {
        // Сервер может подняться позже, HTTP sink пересоздаст bucket сам
        warn!("Не удалось подготовить bucket {}: {}", bucket_id, e);
    }

    let provider = create_window_provider(
        config.watcher.detection_method,
        args.dry_run,
        config.provider_timeout(),
    );
    let cancel = CancellationToken::new();

    let settings = PollLoopSettings {
        bucket_id,
        poll_interval: config.poll_interval(),
        provider_timeout: config.provider_timeout(),
        coalescer: CoalescerConfig {
            update_threshold: config.update_threshold(),
            exclude_title: config.watcher.exclude_title,
        },
    };
    let poll_loop = PollLoop::new(settings, provider, sink, cancel.clone());

    let parent_handle = if args.no_parent_watch {
        None
    } else {
        utils::spawn_parent_watch(utils::ParentWatch::new(), PARENT_CHECK_INTERVAL, cancel.clone())
    };

    info!("Все компоненты инициализированы");

    let mut poll_handle = tokio::spawn(async move {
        if let Err(e) = poll_loop.run().await {
            error!("Ошибка в PollLoop: {}", e);
        }
    });

    // Ожидание сигнала завершения
    tokio::select! {
        _ = shutdown_signal() => {}
        _ = cancel.cancelled() => {
            info!("Получена внешняя отмена");
        }
        _ = &mut poll_handle => {
            warn!("PollLoop завершился сам");
        }
    }

    info!("Завершение работы...");
    cancel.cancel();

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        if !poll_handle.is_finished() {
            let _ = poll_handle.await;
        }
        if let Some(handle) = parent_handle {
            let _ = handle.await;
        }
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("window-watcher завершил работу");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
            Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Получен сигнал завершения (SIGTERM)");
            }
            Err(err) => {
                error!("Не удалось подписаться на SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))?;

    let (full, compact) = match logging.format.as_str() {
        "pretty" => (Some(fmt::layer()), None),
        _ => (None, Some(fmt::layer().compact())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(full)
        .with(compact)
        .init();

    Ok(())
}
