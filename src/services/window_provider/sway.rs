use crate::error::Result;
use crate::events::WindowSnapshot;
use serde_json::Value;

use super::command::{command, run};
use super::r#trait::WindowProvider;

pub struct SwayProvider;

impl SwayProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Найти узел с `"focused": true` в дереве `swaymsg -t get_tree`
pub(super) fn find_focused(node: &Value) -> Option<WindowSnapshot> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        let app = node
            .get("app_id")
            .and_then(Value::as_str)
            .or_else(|| node.pointer("/window_properties/class").and_then(Value::as_str))
            .unwrap_or_default();
        let title = node.get("name").and_then(Value::as_str).unwrap_or_default();
        return Some(WindowSnapshot::new(app, title));
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(find_focused)
}

#[async_trait::async_trait]
impl WindowProvider for SwayProvider {
    fn name(&self) -> &'static str {
        "sway"
    }

    async fn current_window(&self) -> Result<Option<WindowSnapshot>> {
        let stdout = run(command("swaymsg", &["-t", "get_tree"]), "swaymsg").await?;
        let tree: Value = serde_json::from_str(&stdout)?;
        Ok(find_focused(&tree))
    }
}
