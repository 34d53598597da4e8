/// Signal handling for the tick loop.
///
/// SIGHUP toggles monitoring on/off (manual maintenance windows); SIGINT and
/// SIGTERM request graceful shutdown. Handlers only set flags; every real
/// consequence (flipping the enabled state, disarming the hardware watchdog,
/// exiting) happens in the tick loop, which observes the flags at the top of
/// each iteration. The shutdown flag additionally wakes the loop so a
/// shutdown doesn't wait out the remainder of a tick sleep.
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::debug;

pub struct Signals {
    toggle: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    wakeup: Arc<Notify>,
}

impl Signals {
    /// Register the signal streams. Must be called from within the runtime.
    pub fn install() -> io::Result<Self> {
        let toggle = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let wakeup = Arc::new(Notify::new());

        let mut hangup = signal(SignalKind::hangup())?;
        let toggle_flag = Arc::clone(&toggle);
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                debug!("SIGHUP received");
                toggle_flag.store(true, Ordering::SeqCst);
            }
        });

        let mut terminate = signal(SignalKind::terminate())?;
        let mut interrupt = signal(SignalKind::interrupt())?;
        let shutdown_flag = Arc::clone(&shutdown);
        let shutdown_wakeup = Arc::clone(&wakeup);
        tokio::spawn(async move {
            tokio::select! {
                _ = terminate.recv() => debug!("SIGTERM received"),
                _ = interrupt.recv() => debug!("SIGINT received"),
            }
            shutdown_flag.store(true, Ordering::SeqCst);
            shutdown_wakeup.notify_one();
        });

        Ok(Self {
            toggle,
            shutdown,
            wakeup,
        })
    }

    /// True once per SIGHUP delivery; clears the flag.
    pub fn take_toggle(&self) -> bool {
        self.toggle.swap(false, Ordering::SeqCst)
    }

    /// True once shutdown has been requested. Never clears.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Resolves when shutdown is requested; pending forever otherwise.
    pub async fn wait_shutdown(&self) {
        self.wakeup.notified().await;
    }
}
