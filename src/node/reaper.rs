use super::service::PitNodeService;
use crate::core::{PitError, Result};
use log::warn;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep};

/// Background worker that periodically drops expired reader contexts.
pub struct ContextReaper {
    stop_tx: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl ContextReaper {
    /// Signals the worker to stop and waits for it to finish.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(join_handle) = self.join_handle.take() {
            join_handle
                .await
                .map_err(|err| PitError::ExecutionError(format!("context reaper join: {}", err)))?;
        }
        Ok(())
    }
}

impl Drop for ContextReaper {
    fn drop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            join_handle.abort();
        }
    }
}

/// Spawns the expiry sweep for `service` using its configured interval.
pub fn spawn_context_reaper(service: Arc<PitNodeService>) -> Result<ContextReaper> {
    let interval_ms = service
        .config()
        .reaper_interval_ms
        .ok_or_else(|| {
            PitError::Config(
                "reaper_interval_ms must be configured to start the context reaper".to_string(),
            )
        })?
        .max(10);

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let join_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    break;
                }
                _ = sleep(Duration::from_millis(interval_ms)) => {
                    if let Err(err) = service.expire_sweep() {
                        warn!("context reaper on node '{}' failed: {}", service.node_id(), err);
                    }
                }
            }
        }
    });

    Ok(ContextReaper {
        stop_tx: Some(stop_tx),
        join_handle: Some(join_handle),
    })
}
