// Cooperative shutdown: one trigger, any number of listeners.
//
// Long sleeps in the monitor and the chunk loop in the batch job select on
// `notified()`, so Ctrl-C or SIGTERM takes effect at the next wait instead
// of after it.

use tokio::sync::watch;
use tracing::info;

#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, ShutdownListener { receiver })
    }

    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }
}

impl ShutdownListener {
    /// Resolve once shutdown has been triggered.
    ///
    /// If every `Shutdown` handle is dropped without triggering, this never
    /// resolves: nobody is left who could ask us to stop.
    pub async fn notified(&mut self) {
        if *self.receiver.borrow() {
            return;
        }
        if self.receiver.wait_for(|stop| *stop).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}

pub fn install_signal_handlers(shutdown: Shutdown) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            ctrlc.trigger();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown.clone();
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                info!("SIGTERM received, shutting down");
                term.trigger();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn listeners_see_trigger() {
        let (shutdown, mut listener) = Shutdown::new();
        let other = listener.clone();
        assert!(!listener.is_triggered());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), listener.notified())
            .await
            .expect("notified should resolve after trigger");
        assert!(other.is_triggered());
    }

    #[tokio::test]
    async fn dropped_trigger_never_fires() {
        let (shutdown, mut listener) = Shutdown::new();
        drop(shutdown);
        let waited = tokio::time::timeout(Duration::from_millis(50), listener.notified()).await;
        assert!(waited.is_err());
    }
}
