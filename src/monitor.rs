use crate::config::MonitorConfig;
use crate::probe::ProbeReading;
use chrono::{DateTime, Local};
use tracing::{debug, warn};

/// Decision returned by the staleness monitor after evaluating one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Heartbeat is fresh (or startup grace is active) — nothing to do.
    None,
    /// Heartbeat is stale with a working probe — terminate the hub process.
    Kill,
    /// Probe has been unavailable too long — reboot the host.
    Reboot,
}

/// Staleness state machine, evaluated once per tick.
///
/// Tracks two independent failure modes: a stale heartbeat with a working
/// probe means the hub process is hung and a targeted kill may suffice,
/// while a probe that cannot be read at all means the query path itself is
/// broken and no corrective kill is possible, only a reboot. The two are
/// therefore counted and thresholded separately.
///
/// Pure and synchronous: callers pass in the probe reading and the current
/// time, so every transition is directly testable.
pub struct StalenessMonitor {
    kill_after_mins: u32,
    reboot_after_mins: u32,
    probe_failures: u32,
    grace_remaining: u32,
}

impl StalenessMonitor {
    /// Create a monitor with thresholds from config and the full startup
    /// grace window remaining.
    pub fn new(cfg: &MonitorConfig) -> Self {
        Self {
            kill_after_mins: cfg.kill_after_mins,
            reboot_after_mins: cfg.reboot_after_mins,
            probe_failures: 0,
            grace_remaining: cfg.init_grace_mins,
        }
    }

    /// Evaluate one probe reading and decide whether to escalate.
    ///
    /// Unavailable readings increment the failure counter; the tick on which
    /// it reaches `reboot_after_mins` returns `Reboot` and resets the
    /// counter. A valid timestamp resets the counter unconditionally, then
    /// either burns one tick of startup grace or compares the marker age
    /// against `kill_after_mins`.
    pub fn evaluate(&mut self, reading: ProbeReading, now: DateTime<Local>) -> Escalation {
        match reading {
            ProbeReading::Unavailable => {
                self.probe_failures += 1;
                if self.probe_failures >= self.reboot_after_mins {
                    warn!(
                        failed_mins = self.probe_failures,
                        "heartbeat unreadable past reboot threshold"
                    );
                    self.probe_failures = 0;
                    return Escalation::Reboot;
                }
                debug!(
                    failed_mins = self.probe_failures,
                    "unable to determine heartbeat timestamp"
                );
                Escalation::None
            }
            ProbeReading::Stamped(stamp) => {
                self.probe_failures = 0;
                // Marker timestamps ahead of the clock read as age 0.
                let age_mins = (now - stamp).num_minutes().max(0);
                debug!(age_mins, stamp = %stamp, "heartbeat marker age");

                if self.grace_remaining > 0 {
                    self.grace_remaining -= 1;
                    debug!(
                        remaining_mins = self.grace_remaining,
                        "startup grace active, escalation suppressed"
                    );
                    return Escalation::None;
                }
                if age_mins >= i64::from(self.kill_after_mins) {
                    warn!(age_mins, "heartbeat stale past kill threshold");
                    return Escalation::Kill;
                }
                Escalation::None
            }
        }
    }

    /// Consecutive ticks on which the probe was unavailable.
    #[allow(dead_code)]
    pub fn probe_failures(&self) -> u32 {
        self.probe_failures
    }

    /// Startup-grace ticks not yet burned.
    #[allow(dead_code)]
    pub fn grace_remaining(&self) -> u32 {
        self.grace_remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn monitor(kill_after: u32, grace: u32, reboot_after: u32) -> StalenessMonitor {
        StalenessMonitor::new(&MonitorConfig {
            kill_after_mins: kill_after,
            init_grace_mins: grace,
            reboot_after_mins: reboot_after,
        })
    }

    fn stamped_mins_ago(now: DateTime<Local>, mins: i64) -> ProbeReading {
        ProbeReading::Stamped(now - Duration::minutes(mins))
    }

    #[test]
    fn test_fresh_heartbeat_no_action() {
        let now = Local::now();
        let mut m = monitor(3, 0, 60);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 0), now), Escalation::None);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 2), now), Escalation::None);
    }

    #[test]
    fn test_stale_heartbeat_kills() {
        let now = Local::now();
        let mut m = monitor(3, 0, 60);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 5), now), Escalation::Kill);
    }

    #[test]
    fn test_age_exactly_at_threshold_kills() {
        let now = Local::now();
        let mut m = monitor(3, 0, 60);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 3), now), Escalation::Kill);
    }

    #[test]
    fn test_grace_suppresses_kill_until_exhausted() {
        // Marker stays 10 minutes old throughout; only grace delays the kill.
        let now = Local::now();
        let mut m = monitor(3, 2, 60);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 10), now), Escalation::None);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 10), now), Escalation::None);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 10), now), Escalation::Kill);
    }

    #[test]
    fn test_grace_only_burns_on_successful_probe() {
        let now = Local::now();
        let mut m = monitor(3, 1, 60);
        // Failed probes leave the grace window untouched.
        assert_eq!(m.evaluate(ProbeReading::Unavailable, now), Escalation::None);
        assert_eq!(m.evaluate(ProbeReading::Unavailable, now), Escalation::None);
        assert_eq!(m.grace_remaining(), 1);
        // First successful probe burns the last grace tick.
        assert_eq!(m.evaluate(stamped_mins_ago(now, 10), now), Escalation::None);
        assert_eq!(m.grace_remaining(), 0);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 10), now), Escalation::Kill);
    }

    #[test]
    fn test_grace_still_resets_failure_counter() {
        let now = Local::now();
        let mut m = monitor(3, 5, 60);
        m.evaluate(ProbeReading::Unavailable, now);
        m.evaluate(ProbeReading::Unavailable, now);
        assert_eq!(m.probe_failures(), 2);
        m.evaluate(stamped_mins_ago(now, 10), now);
        assert_eq!(m.probe_failures(), 0);
    }

    #[test]
    fn test_failures_below_threshold_count_without_escalating() {
        let now = Local::now();
        let mut m = monitor(3, 0, 60);
        for n in 1..60 {
            assert_eq!(m.evaluate(ProbeReading::Unavailable, now), Escalation::None);
            assert_eq!(m.probe_failures(), n);
        }
    }

    #[test]
    fn test_reboot_fires_exactly_at_threshold_and_resets() {
        let now = Local::now();
        let mut m = monitor(3, 0, 5);
        for _ in 0..4 {
            assert_eq!(m.evaluate(ProbeReading::Unavailable, now), Escalation::None);
        }
        assert_eq!(m.evaluate(ProbeReading::Unavailable, now), Escalation::Reboot);
        assert_eq!(m.probe_failures(), 0);
        // A fresh run of failures starts counting from scratch.
        assert_eq!(m.evaluate(ProbeReading::Unavailable, now), Escalation::None);
        assert_eq!(m.probe_failures(), 1);
    }

    #[test]
    fn test_successful_probe_resets_failure_counter() {
        let now = Local::now();
        let mut m = monitor(3, 0, 5);
        m.evaluate(ProbeReading::Unavailable, now);
        m.evaluate(ProbeReading::Unavailable, now);
        assert_eq!(m.probe_failures(), 2);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 0), now), Escalation::None);
        assert_eq!(m.probe_failures(), 0);
        // The run of failures must start over after a good reading.
        for _ in 0..4 {
            assert_eq!(m.evaluate(ProbeReading::Unavailable, now), Escalation::None);
        }
        assert_eq!(m.evaluate(ProbeReading::Unavailable, now), Escalation::Reboot);
    }

    #[test]
    fn test_kill_after_zero_escalates_any_age() {
        let now = Local::now();
        let mut m = monitor(0, 0, 60);
        assert_eq!(m.evaluate(stamped_mins_ago(now, 0), now), Escalation::Kill);
    }

    #[test]
    fn test_marker_ahead_of_clock_reads_as_fresh() {
        let now = Local::now();
        let mut m = monitor(3, 0, 60);
        // Clock skew: marker "from the future" must not escalate.
        assert_eq!(m.evaluate(stamped_mins_ago(now, -10), now), Escalation::None);
    }

    #[test]
    fn test_sub_minute_age_floors_to_zero() {
        let now = Local::now();
        let mut m = monitor(1, 0, 60);
        let reading = ProbeReading::Stamped(now - Duration::seconds(59));
        assert_eq!(m.evaluate(reading, now), Escalation::None);
        let reading = ProbeReading::Stamped(now - Duration::seconds(60));
        assert_eq!(m.evaluate(reading, now), Escalation::Kill);
    }
}
