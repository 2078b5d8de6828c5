use crate::error::{Result, WatcherError};
use crate::events::WindowSnapshot;

use super::command::{command, run};
use super::r#trait::WindowProvider;
use super::xprop::active_window_id;

/// `wmctrl -lx` + ID активного окна из xprop
pub struct WmctrlProvider;

impl WmctrlProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Разобрать строку `wmctrl -lx`: `<id> <desktop> <instance.Class> <host> <title...>`
pub(super) fn parse_wmctrl_line(line: &str) -> Option<(u64, WindowSnapshot)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }

    let id = u64::from_str_radix(parts[0].trim_start_matches("0x"), 16).ok()?;
    let class = parts[2];
    let app = class.split_once('.').map(|(_, c)| c).unwrap_or(class);
    let title = parts[4..].join(" ");

    Some((id, WindowSnapshot::new(app, title)))
}

#[async_trait::async_trait]
impl WindowProvider for WmctrlProvider {
    fn name(&self) -> &'static str {
        "wmctrl"
    }

    async fn current_window(&self) -> Result<Option<WindowSnapshot>> {
        let Some(active_id) = active_window_id().await? else {
            return Ok(None);
        };

        let stdout = run(command("wmctrl", &["-lx"]), "wmctrl").await?;

        match stdout
            .lines()
            .filter_map(parse_wmctrl_line)
            .find(|(id, _)| *id == active_id)
        {
            Some((_, window)) => Ok(Some(window)),
            None => WatcherError::provider_unavailable("Активное окно не найдено в wmctrl"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wmctrl_line() {
        let (id, window) =
            parse_wmctrl_line("0x03a00007  0 Navigator.firefox     box Rust  docs - Mozilla Firefox").unwrap();
        assert_eq!(id, 0x3a00007);
        assert_eq!(window.app, "firefox");
        assert_eq!(window.title, "Rust docs - Mozilla Firefox");
    }

    #[test]
    fn test_parse_wmctrl_line_without_title() {
        let (_, window) = parse_wmctrl_line("0x01000003 -1 xfce4-panel box").unwrap();
        assert_eq!(window.app, "xfce4-panel");
        assert_eq!(window.title, "unknown");
        assert!(parse_wmctrl_line("garbage").is_none());
    }
}
