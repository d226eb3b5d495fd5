//! Ctrl-C / SIGTERM handling.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// ---

/// Resolve on Ctrl-C, SIGTERM or `cancel`, then cancel `cancel`.
///
/// Pass the returned future to `axum::serve(..).with_graceful_shutdown`;
/// every task holding a clone of the token observes the same shutdown.
pub async fn shutdown_signal(cancel: CancellationToken) {
    // ---
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
        () = cancel.cancelled() => info!("Shutdown requested"),
    }
    cancel.cancel();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn resolves_when_cancelled_elsewhere() {
        let cancel = CancellationToken::new();
        let waiting = tokio::spawn(shutdown_signal(cancel.clone()));
        cancel.cancel();
        assert_ok!(waiting.await);
        assert!(cancel.is_cancelled());
    }
}
