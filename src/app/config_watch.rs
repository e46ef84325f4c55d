use crate::error::Result;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// True for events that mean the file contents were written
pub fn is_write_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    )
}

/// Watches the configuration file and forwards one message per write event.
/// Writes are not coalesced.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<(Self, mpsc::UnboundedReceiver<()>)> {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let watched = path.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if is_write_event(&event.kind) => {
                    debug!("Config write event: {:?}", event.paths);
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => warn!("Error watching {}: {}", watched.display(), e),
            }
        })?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        info!("Watching {} for changes", path.display());
        Ok((
            Self {
                path,
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
