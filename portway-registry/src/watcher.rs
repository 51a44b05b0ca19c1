//! File-change notification that triggers a registry rescan (`spec.md`
//! §4.C, §5). Uses `notify`'s recommended watcher and debounces bursts of
//! filesystem events (editors tend to write several events per save) into a
//! single rescan.

use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

use crate::snapshot::EndpointRegistry;

pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Spawns a background thread watching the registry's descriptor root.
/// Returns the underlying watcher; dropping it stops the watch.
pub fn watch(registry: Arc<EndpointRegistry>) -> notify::Result<notify::RecommendedWatcher> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    })?;
    watcher.watch(registry.root_path(), RecursiveMode::Recursive)?;

    std::thread::spawn(move || {
        loop {
            // Block for the first event, then drain anything else that
            // arrives within the debounce window before rescanning once.
            match rx.recv() {
                Ok(Ok(_event)) => {
                    while rx.recv_timeout(DEBOUNCE).is_ok() {}
                    log::info!("descriptor tree changed, rescanning endpoint registry");
                    registry.rescan();
                }
                Ok(Err(e)) => {
                    log::warn!("descriptor watch error: {e}");
                }
                Err(_) => break, // sender dropped: watcher was dropped
            }
        }
    });

    Ok(watcher)
}
