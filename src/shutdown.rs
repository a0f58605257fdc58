//! Cancellation of pending operations when the plugin is interrupted.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` when the process receives SIGINT or SIGTERM
///
/// The listener stops on its own once the token is cancelled elsewhere.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = interrupted() => {
                info!("interrupted, cancelling pending operations");
                token.cancel();
            }
        }
    });
}

async fn interrupted() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

