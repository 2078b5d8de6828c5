use crate::error::{Result, WatcherError};
use crate::events::WindowSnapshot;
use crate::watcher_error;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use super::kdotool::KdotoolProvider;
use super::r#trait::WindowProvider;
use super::sway::SwayProvider;
use super::wmctrl::WmctrlProvider;
use super::xdotool::XdotoolProvider;
use super::xprop::XpropProvider;

/// Сколько ошибок подряд допускается до повторного выбора метода
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum DesktopEnvironment {
    KDE,
    Sway,
    X11Generic,
    WaylandGeneric,
    Unknown,
}

impl DesktopEnvironment {
    pub(super) fn detect() -> Self {
        Self::from_vars(
            std::env::var("XDG_CURRENT_DESKTOP").ok().as_deref(),
            std::env::var("XDG_SESSION_TYPE").ok().as_deref(),
            std::env::var_os("SWAYSOCK").is_some(),
        )
    }

    fn from_vars(desktop: Option<&str>, session: Option<&str>, sway_socket: bool) -> Self {
        if sway_socket {
            return DesktopEnvironment::Sway;
        }

        if let Some(desktop) = desktop {
            let desktop = desktop.to_lowercase();
            if desktop.contains("kde") {
                return DesktopEnvironment::KDE;
            }
            if desktop.contains("sway") {
                return DesktopEnvironment::Sway;
            }
        }

        match session {
            Some("wayland") => DesktopEnvironment::WaylandGeneric,
            Some("x11") => DesktopEnvironment::X11Generic,
            _ => DesktopEnvironment::Unknown,
        }
    }

    /// Порядок опроса методов для данной среды
    fn candidates(self) -> Vec<Box<dyn WindowProvider>> {
        match self {
            DesktopEnvironment::KDE => vec![
                Box::new(KdotoolProvider::new()),
                Box::new(XpropProvider::new()),
                Box::new(XdotoolProvider::new()),
            ],
            DesktopEnvironment::Sway => vec![Box::new(SwayProvider::new()), Box::new(XpropProvider::new())],
            DesktopEnvironment::X11Generic => vec![
                Box::new(XpropProvider::new()),
                Box::new(XdotoolProvider::new()),
                Box::new(WmctrlProvider::new()),
            ],
            DesktopEnvironment::WaylandGeneric | DesktopEnvironment::Unknown => vec![
                Box::new(XpropProvider::new()),
                Box::new(XdotoolProvider::new()),
                Box::new(WmctrlProvider::new()),
                Box::new(SwayProvider::new()),
                Box::new(KdotoolProvider::new()),
            ],
        }
    }
}

/// Состояние выбора метода. Курсор сдвигается до вызова `test()`, поэтому
/// прерванный внешним таймаутом перебор продолжается со следующего кандидата.
#[derive(Debug, Default)]
struct DetectionState {
    working_method: Option<usize>,
    next_candidate: usize,
    cooldown_ticks: u32,
}

/// Выбирает первый работающий метод и переопределяет его после серии ошибок
pub struct AutoProvider {
    desktop_env: DesktopEnvironment,
    candidates: Vec<Box<dyn WindowProvider>>,
    call_timeout: Duration,
    state: Mutex<DetectionState>,
    failures: AtomicU32,
}

impl AutoProvider {
    pub fn new(call_timeout: Duration) -> Self {
        let desktop_env = DesktopEnvironment::detect();
        info!("Обнаружена среда рабочего стола: {:?}", desktop_env);
        Self::with_candidates(desktop_env, desktop_env.candidates(), call_timeout)
    }

    pub(super) fn with_candidates(
        desktop_env: DesktopEnvironment,
        candidates: Vec<Box<dyn WindowProvider>>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            desktop_env,
            candidates,
            call_timeout,
            state: Mutex::new(DetectionState::default()),
            failures: AtomicU32::new(0),
        }
    }

    async fn detect_working_method(&self) -> Result<usize> {
        {
            let mut state = self.state.lock();
            if state.cooldown_ticks > 0 {
                state.cooldown_ticks -= 1;
                return Err(watcher_error!(
                    provider_unavailable,
                    "Нет рабочего метода детекции окон, повторная проверка через {} тиков",
                    state.cooldown_ticks + 1
                ));
            }
            if state.next_candidate == 0 {
                info!("Определяем рабочий метод детекции окон для {:?}...", self.desktop_env);
            }
        }

        loop {
            let index = {
                let mut state = self.state.lock();
                let index = state.next_candidate;
                if index >= self.candidates.len() {
                    state.next_candidate = 0;
                    state.cooldown_ticks = MAX_CONSECUTIVE_FAILURES;
                    break;
                }
                state.next_candidate = index + 1;
                index
            };

            let candidate = &self.candidates[index];
            match timeout(self.call_timeout, candidate.test()).await {
                Ok(Ok(())) => {
                    info!("Используем {}", candidate.name());
                    let mut state = self.state.lock();
                    state.working_method = Some(index);
                    state.next_candidate = 0;
                    self.failures.store(0, Ordering::Relaxed);
                    return Ok(index);
                }
                Ok(Err(e)) => info!("Метод {} не работает: {}", candidate.name(), e),
                Err(_) => info!("Метод {} не ответил за {:?}", candidate.name(), self.call_timeout),
            }
        }

        Err(WatcherError::ProviderUnavailable(
            "Ни один метод детекции окон не работает".to_string(),
        ))
    }
}

#[async_trait::async_trait]
impl WindowProvider for AutoProvider {
    fn name(&self) -> &'static str {
        "auto"
    }

    async fn current_window(&self) -> Result<Option<WindowSnapshot>> {
        let current = self.state.lock().working_method;
        let index = match current {
            Some(index) => index,
            None => self.detect_working_method().await?,
        };

        let provider = &self.candidates[index];
        let result = match timeout(self.call_timeout, provider.current_window()).await {
            Ok(result) => result,
            Err(_) => Err(watcher_error!(
                provider_timeout,
                "{} не ответил за {:?}",
                provider.name(),
                self.call_timeout
            )),
        };

        match result {
            Ok(window) => {
                self.failures.store(0, Ordering::Relaxed);
                Ok(window)
            }
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    warn!(
                        "Рабочий метод {} перестал работать ({} ошибок подряд): {}. Переопределяем...",
                        provider.name(),
                        failures,
                        e
                    );
                    self.state.lock().working_method = None;
                }
                Err(e)
            }
        }
    }
}
