use crate::config::DetectionMethod;
use crate::error::Result;
use crate::events::WindowSnapshot;
use std::time::Duration;

use super::auto::AutoProvider;
use super::dry_run::DryRunProvider;
use super::kdotool::KdotoolProvider;
use super::sway::SwayProvider;
use super::wmctrl::WmctrlProvider;
use super::xdotool::XdotoolProvider;
use super::xprop::XpropProvider;

/// Источник снимков активного окна
#[async_trait::async_trait]
pub trait WindowProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Проверить, что метод работает в текущей среде
    async fn test(&self) -> Result<()> {
        self.current_window().await.map(|_| ())
    }

    /// Текущее активное окно; `None`, если определить его не удалось
    async fn current_window(&self) -> Result<Option<WindowSnapshot>>;
}

/// Factory function to create a window provider for the configured method.
/// `provider_timeout` is the per-tick limit enforced by PollLoop.
pub fn create_window_provider(
    method: DetectionMethod,
    dry_run: bool,
    provider_timeout: Duration,
) -> Box<dyn WindowProvider> {
    if dry_run {
        return Box::new(DryRunProvider::new());
    }

    match method {
        // Отдельный метод должен упасть по таймауту раньше, чем тик целиком
        DetectionMethod::Auto => Box::new(AutoProvider::new(provider_timeout / 2)),
        DetectionMethod::Xprop => Box::new(XpropProvider::new()),
        DetectionMethod::Xdotool => Box::new(XdotoolProvider::new()),
        DetectionMethod::Kdotool => Box::new(KdotoolProvider::new()),
        DetectionMethod::Wmctrl => Box::new(WmctrlProvider::new()),
        DetectionMethod::Sway => Box::new(SwayProvider::new()),
    }
}
