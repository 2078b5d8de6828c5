use crate::error::Result;
use crate::events::{WindowSnapshot, UNKNOWN};
use crate::trace_if_enabled;
use tracing::debug;

use super::command::{command, run};
use super::r#trait::WindowProvider;

/// Чтение активного окна X11 через `xprop`
pub struct XpropProvider;

impl XpropProvider {
    pub fn new() -> Self {
        Self
    }
}

/// ID активного окна из `_NET_ACTIVE_WINDOW` корневого окна; `None` для 0x0
pub(super) async fn active_window_id() -> Result<Option<u64>> {
    let root = run(command("xprop", &["-root", "_NET_ACTIVE_WINDOW"]), "xprop").await?;
    Ok(parse_active_window_id(&root))
}

pub(super) fn parse_active_window_id(output: &str) -> Option<u64> {
    let line = output.lines().find(|l| l.contains("_NET_ACTIVE_WINDOW"))?;
    let (_, value) = line.split_once('#')?;
    let id = value
        .split(|c: char| c == ',' || c.is_whitespace())
        .find(|part| !part.is_empty())?;
    let id = u64::from_str_radix(id.trim_start_matches("0x"), 16).ok()?;
    (id != 0).then_some(id)
}

/// Значение поля вида `NAME(TYPE) = value`; `None`, если поле не найдено
fn field_value<'a>(output: &'a str, name: &str) -> Option<&'a str> {
    output
        .lines()
        .filter(|line| line.starts_with(name) && line[name.len()..].starts_with('('))
        .find_map(|line| line.split_once('=').map(|(_, v)| v.trim()))
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let value = value.strip_prefix('"').unwrap_or(value);
    let value = value.strip_suffix('"').unwrap_or(value);
    value.replace("\\\"", "\"").replace("\\\\", "\\")
}

/// Разобрать вывод `xprop -id <wid> WM_CLASS _NET_WM_NAME WM_NAME`.
///
/// Приложение берётся из второго элемента WM_CLASS (класс), заголовок из
/// `_NET_WM_NAME`, а при его отсутствии из `WM_NAME`.
pub(super) fn parse_window(output: &str) -> WindowSnapshot {
    let class: Vec<String> = field_value(output, "WM_CLASS")
        .map(|v| v.split("\", \"").map(unquote).filter(|c| !c.is_empty()).collect())
        .unwrap_or_default();

    let app = class
        .get(1)
        .or_else(|| class.first())
        .cloned()
        .unwrap_or_else(|| UNKNOWN.to_string());

    let title = field_value(output, "_NET_WM_NAME")
        .or_else(|| field_value(output, "WM_NAME"))
        .map(unquote)
        .unwrap_or_else(|| UNKNOWN.to_string());

    WindowSnapshot::new(app, title)
}

#[async_trait::async_trait]
impl WindowProvider for XpropProvider {
    fn name(&self) -> &'static str {
        "xprop"
    }

    async fn current_window(&self) -> Result<Option<WindowSnapshot>> {
        let Some(wid) = active_window_id().await? else {
            debug!("xprop: активное окно не найдено, id 0x0");
            return Ok(None);
        };

        let wid = format!("{:#x}", wid);
        let props = run(
            command("xprop", &["-id", &wid, "WM_CLASS", "_NET_WM_NAME", "WM_NAME"]),
            "xprop",
        )
        .await?;

        let snapshot = parse_window(&props);
        trace_if_enabled!("xprop: окно {} -> {}", wid, snapshot);
        Ok(Some(snapshot))
    }
}
