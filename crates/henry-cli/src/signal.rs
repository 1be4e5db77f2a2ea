use std::future::Future;
use std::io;
use tracing::{info, warn};

/// Completes on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    () = wait_for_ctrl_c() => {},
                    _ = term.recv() => info!("Received SIGTERM"),
                }
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {err}");
                wait_for_ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        wait_for_ctrl_c().await;
    }
}

async fn wait_for_ctrl_c() {
    settle_ctrl_c(tokio::signal::ctrl_c()).await;
}

/// Completes when `listener` reports Ctrl-C; never completes if it fails.
async fn settle_ctrl_c(listener: impl Future<Output = io::Result<()>>) {
    match listener.await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(err) => {
            // Without a signal source the bridge runs until killed.
            warn!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    }
}
