use std::os::unix::process::parent_id;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Обнаружение завершения родительского процесса (супервизора).
///
/// Когда родитель умирает, процесс переподчиняется init или subreaper,
/// и pid родителя меняется.
pub struct ParentWatch {
    initial_parent: u32,
}

impl Default for ParentWatch {
    fn default() -> Self {
        Self::new()
    }
}

impl ParentWatch {
    pub fn new() -> Self {
        Self::with_parent(parent_id())
    }

    pub fn with_parent(initial_parent: u32) -> Self {
        Self { initial_parent }
    }

    pub fn initial_parent(&self) -> u32 {
        self.initial_parent
    }

    pub fn parent_alive(&self) -> bool {
        parent_id() == self.initial_parent
    }
}

/// Фоновая задача: отменяет `cancel`, когда родитель завершился.
/// Для процессов, запущенных сразу под init (pid 1), слежение не имеет смысла.
pub fn spawn_parent_watch(
    watch: ParentWatch,
    check_interval: Duration,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    if watch.initial_parent() <= 1 {
        debug!("Родитель - init, слежение за родительским процессом отключено");
        return None;
    }

    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(check_interval) => {
                    if !watch.parent_alive() {
                        info!("Родительский процесс {} завершился, останавливаемся", watch.initial_parent());
                        cancel.cancel();
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    }))
}
