/// The tick loop: feed the hardware watchdog, evaluate the heartbeat, and
/// perform whatever escalation the monitor decides.
use crate::config::WatchConfig;
use crate::escalate::{self, EscalationOutcome};
use crate::hardware::WatchdogDevice;
use crate::monitor::{Escalation, StalenessMonitor};
use crate::probe;
use crate::signals::Signals;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Fixed tick period. Escalation thresholds are expressed in ticks, so this
/// is deliberately not configurable.
pub const TICK_PERIOD: Duration = Duration::from_secs(60);

pub struct Runtime {
    config: WatchConfig,
    monitor: StalenessMonitor,
    device: Option<WatchdogDevice>,
    signals: Signals,
    enabled: bool,
}

impl Runtime {
    pub fn new(config: WatchConfig, device: Option<WatchdogDevice>, signals: Signals) -> Self {
        if config.probe.timeout_secs >= TICK_PERIOD.as_secs() {
            warn!(
                timeout_secs = config.probe.timeout_secs,
                tick_secs = TICK_PERIOD.as_secs(),
                "probe timeout reaches the tick period; a hung probe will delay ticks"
            );
        }
        let monitor = StalenessMonitor::new(&config.monitor);
        Self {
            config,
            monitor,
            device,
            signals,
            enabled: true,
        }
    }

    /// Run until shutdown is requested or a reboot has been issued.
    ///
    /// Each tick: observe the signal flags, feed the hardware watchdog
    /// unconditionally, then (unless monitoring is toggled off) probe the
    /// heartbeat and act on the monitor's decision. The select lets a
    /// shutdown request interrupt the tick sleep instead of waiting it out.
    pub async fn run(mut self) {
        info!(
            kill_after_mins = self.config.monitor.kill_after_mins,
            init_grace_mins = self.config.monitor.init_grace_mins,
            reboot_after_mins = self.config.monitor.reboot_after_mins,
            process = %self.config.process.name,
            hardware_watchdog = self.device.is_some(),
            "watchdog loop running"
        );

        let mut ticker = tokio::time::interval(TICK_PERIOD);
        // A slow tick (e.g. a probe at its timeout) delays the next one
        // rather than bunching ticks together.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.signals.wait_shutdown() => {}
            }

            if self.signals.take_toggle() {
                self.enabled = !self.enabled;
                info!(enabled = self.enabled, "monitoring toggled by signal");
            }
            if self.signals.shutdown_requested() {
                info!("shutdown requested, exiting");
                if let Some(device) = self.device.take() {
                    device.disarm();
                }
                return;
            }

            if let Some(device) = self.device.as_mut() {
                device.pet();
            }
            if !self.enabled {
                continue;
            }

            let reading = probe::read_heartbeat(&self.config.probe).await;
            match self.monitor.evaluate(reading, chrono::Local::now()) {
                Escalation::None => {}
                Escalation::Kill => match escalate::soft_escalate(&self.config).await {
                    EscalationOutcome::Killed { pid } => {
                        debug!(pid, "soft escalation complete, loop continues");
                    }
                    EscalationOutcome::RebootIssued => {
                        // Leave the hardware watchdog armed to backstop the reboot.
                        info!("reboot issued, watchdog loop stopping");
                        return;
                    }
                },
                Escalation::Reboot => {
                    escalate::hard_escalate(&self.config).await;
                    info!("reboot issued, watchdog loop stopping");
                    return;
                }
            }
        }
    }
}
