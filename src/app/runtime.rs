use super::ShutdownReason;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info};

/// Install SIGTERM and SIGINT handlers; the receiver resolves with whichever
/// arrives first.
pub fn spawn_signal_handlers() -> oneshot::Receiver<ShutdownReason> {
    let (sender, receiver) = oneshot::channel();
    let sender = Arc::new(Mutex::new(Some(sender)));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let sender = Arc::clone(&sender);
        tokio::spawn(async move {
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    return;
                }
            };
            if sigterm.recv().await.is_some() {
                info!("Received SIGTERM signal");
                if let Some(sender) = sender.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                }
            }
        });
    }

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received SIGINT signal (Ctrl+C)");
            if let Some(sender) = sender.lock().await.take() {
                let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
            }
        }
    });

    receiver
}

/// Resolve when a termination signal arrives
pub async fn shutdown_signal() -> ShutdownReason {
    spawn_signal_handlers()
        .await
        .unwrap_or_else(|_| ShutdownReason::Error("signal handlers stopped".to_string()))
}
