use crate::error::Result;
use crate::events::WindowSnapshot;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use super::r#trait::WindowProvider;

/// Сколько опросов подряд возвращается одно и то же окно
const POLLS_PER_WINDOW: usize = 10;

const FAKE_WINDOWS: [(&str, &str); 4] = [
    ("Terminal", "Terminal - dry_run"),
    ("Browser", "Browser - dry_run"),
    ("Editor", "Editor - dry_run"),
    ("Game", "Game - dry_run"),
];

/// Эмуляция смены окон для dry-run режима
pub struct DryRunProvider {
    polls: AtomicUsize,
}

impl DryRunProvider {
    pub fn new() -> Self {
        info!("Dry-run режим - WindowProvider работает в режиме эмуляции");
        Self {
            polls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl WindowProvider for DryRunProvider {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn current_window(&self) -> Result<Option<WindowSnapshot>> {
        let poll = self.polls.fetch_add(1, Ordering::Relaxed);
        let (app, title) = FAKE_WINDOWS[(poll / POLLS_PER_WINDOW) % FAKE_WINDOWS.len()];
        Ok(Some(WindowSnapshot::new(app, title)))
    }
}
