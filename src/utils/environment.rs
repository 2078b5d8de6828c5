use tracing::{info, warn};

/// Проверить окружение графической сессии. Никогда не завершает работу,
/// только предупреждает: провайдер сам вернёт ошибку, если окно недоступно.
pub fn check_environment() {
    info!("Проверка окружения...");

    let display = std::env::var("DISPLAY").ok();
    let wayland = std::env::var("WAYLAND_DISPLAY").ok();
    if !has_display(display.as_deref(), wayland.as_deref()) {
        warn!("Не заданы DISPLAY и WAYLAND_DISPLAY - активное окно, скорее всего, не определится");
    }

    check_not_root();
}

fn has_display(display: Option<&str>, wayland: Option<&str>) -> bool {
    [display, wayland]
        .into_iter()
        .flatten()
        .any(|value| !value.trim().is_empty())
}

fn check_not_root() {
    // Проверяем переменную окружения USER
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("⚠️  Приложение запущено от имени root!");
            warn!("   Наблюдатель окон должен работать в сессии пользователя,");
            warn!("   иначе X11/Wayland утилиты не увидят его окна");
        }
        Ok(user) => {
            info!("Приложение запущено от имени пользователя: {}", user);
        }
        Err(_) => {
            warn!("Не удалось определить пользователя");
        }
    }
}
