use crate::error::{Result, WatcherError};
use crate::events::WindowSnapshot;
use std::collections::HashMap;
use tokio::process::Command;
use tracing::debug;

use super::command::{command, run};
use super::r#trait::WindowProvider;

/// KDE Wayland через `kdotool` (D-Bus KWin скрипты)
pub struct KdotoolProvider {
    env_overrides: HashMap<String, String>,
}

fn build_env_overrides() -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    if std::env::var("USER").unwrap_or_default() == "root" {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            if let Ok(output) = std::process::Command::new("id").args(["-u", &sudo_user]).output() {
                if let Ok(uid_str) = String::from_utf8(output.stdout) {
                    let uid = uid_str.trim();
                    let user_runtime_dir = format!("/run/user/{}", uid);
                    let dbus_address = format!("unix:path={}/bus", user_runtime_dir);

                    debug!("Подставляем переменные окружения для пользователя {}: uid={}", sudo_user, uid);
                    env_vars.insert("DBUS_SESSION_BUS_ADDRESS".to_string(), dbus_address);
                    env_vars.insert("XDG_RUNTIME_DIR".to_string(), user_runtime_dir);
                    env_vars.insert("USER".to_string(), sudo_user);
                }
            }
        }
    }

    if let Ok(display_var) = std::env::var("DISPLAY") {
        env_vars.insert("DISPLAY".to_string(), display_var);
    }

    env_vars
}

impl KdotoolProvider {
    pub fn new() -> Self {
        // Окружение сессии не меняется за время работы, строим один раз
        Self {
            env_overrides: build_env_overrides(),
        }
    }

    fn create_command(&self, args: &[&str]) -> Command {
        let mut cmd = if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            let mut sudo_args = vec!["-E", "-u", sudo_user.as_str(), "kdotool"];
            sudo_args.extend_from_slice(args);
            command("sudo", &sudo_args)
        } else {
            command("kdotool", args)
        };

        cmd.envs(&self.env_overrides);

        cmd
    }

    async fn query(&self, args: &[&str]) -> Result<String> {
        let out = run(self.create_command(args), "kdotool").await?;
        Ok(out.trim().to_string())
    }
}

#[async_trait::async_trait]
impl WindowProvider for KdotoolProvider {
    fn name(&self) -> &'static str {
        "kdotool"
    }

    async fn current_window(&self) -> Result<Option<WindowSnapshot>> {
        // Получаем ID окна
        let window_id = self.query(&["getactivewindow"]).await?;
        if window_id.is_empty() {
            return Ok(None);
        }

        // Получаем название и класс окна по ID
        let title = self.query(&["getwindowname", &window_id]).await?;
        if title.is_empty() {
            return Err(WatcherError::ProviderUnavailable("kdotool вернул пустое название".to_string()));
        }

        let app = self.query(&["getwindowclassname", &window_id])
            .await
            .unwrap_or_default();

        Ok(Some(WindowSnapshot::new(app, title)))
    }
}
