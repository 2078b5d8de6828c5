use crate::error::{Result, WatcherError};
use crate::events::{WindowSnapshot, UNKNOWN};
use tracing::debug;

use super::command::{command, run};
use super::r#trait::WindowProvider;

pub struct XdotoolProvider;

impl XdotoolProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl WindowProvider for XdotoolProvider {
    fn name(&self) -> &'static str {
        "xdotool"
    }

    async fn current_window(&self) -> Result<Option<WindowSnapshot>> {
        debug!("Попытка получить активное окно через xdotool");
        let title = run(command("xdotool", &["getactivewindow", "getwindowname"]), "xdotool").await?;
        let title = title.trim().to_string();
        debug!("xdotool получил заголовок окна: '{}'", title);

        // Класс окна не критичен: без него приложение считается unknown
        let app = match run(command("xdotool", &["getactivewindow", "getwindowclassname"]), "xdotool").await {
            Ok(class_name) => class_name.trim().to_string(),
            Err(WatcherError::ProviderUnavailable(msg)) => {
                debug!("Не удалось получить класс окна: {}", msg);
                UNKNOWN.to_string()
            }
            Err(e) => return Err(e),
        };

        Ok(Some(WindowSnapshot::new(app, title)))
    }
}
