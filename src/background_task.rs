use std::{path::PathBuf, time::Duration};

use tokio::{sync::watch, time::interval};

use crate::storage::provisioner::sweep_stale;

/// Periodically deletes abandoned uploads from the temp directory until shutdown is signalled.
pub async fn start_temp_sweep_task(
    tmp_dir: PathBuf,
    max_age: Duration,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = interval(every);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match sweep_stale(&tmp_dir, max_age).await {
                    Ok(0) => tracing::debug!("Temp sweep found nothing to remove"),
                    Ok(count) => tracing::info!("Swept {} stale upload(s) from {}", count, tmp_dir.display()),
                    Err(e) => tracing::error!("Temp sweep failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("Temp sweep stopped");
                    break;
                }
            }
        }
    }
}
