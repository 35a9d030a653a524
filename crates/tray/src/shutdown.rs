//! Process-wide stop signal for the tray.
//!
//! Fired by the Ctrl+C watcher in `main` or the tray's Exit item. A tray that
//! fails to start fires it as well. The refresh loop and the tray wait on it.

use tokio::sync::broadcast;

/// A cloneable stop handle. Each clone has its own receiver, and once a
/// clone has observed the stop, `recv` on it returns immediately.
pub struct Shutdown {
    stopped: bool,
    notify: broadcast::Sender<()>,
    listener: broadcast::Receiver<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, listener) = broadcast::channel(1);
        Self {
            stopped: false,
            notify,
            listener,
        }
    }

    /// Ask every holder to stop. Firing more than once is harmless.
    pub fn trigger(&self) {
        let _ = self.notify.send(());
    }

    pub async fn recv(&mut self) {
        if self.stopped {
            return;
        }

        // A lagged receiver has missed at least one trigger, so it stops too.
        let _ = self.listener.recv().await;
        self.stopped = true;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Shutdown {
    fn clone(&self) -> Self {
        Self {
            stopped: self.stopped,
            notify: self.notify.clone(),
            listener: self.notify.subscribe(),
        }
    }
}
