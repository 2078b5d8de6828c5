use crate::error::{Result, WatcherError};
use std::io::ErrorKind;
use tokio::process::Command;
use tracing::debug;

/// Создать команду, которая будет убита, если тик прервётся по таймауту
pub(super) fn command(program: &str, args: &[&str]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true);
    cmd
}

/// Выполнить команду и вернуть stdout
pub(super) async fn run(mut cmd: Command, label: &str) -> Result<String> {
    let output = cmd.output().await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            WatcherError::ProviderUnavailable(format!("{} не найден", label))
        } else {
            WatcherError::ProviderUnavailable(format!("{} не запустился: {}", label, e))
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("{} вернул ошибку: {}", label, stderr.trim());
        return Err(WatcherError::ProviderUnavailable(format!(
            "{} вернул ошибку: {}",
            label,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
