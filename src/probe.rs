/// Heartbeat marker probe: run the configured query command, bounded in time,
/// and parse its first output line as a timestamp.
use crate::config::ProbeConfig;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Format the query command is expected to print, e.g. `2026-08-05 14:03:07`.
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One probe observation, as handed to the staleness monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReading {
    /// The heartbeat marker was last touched at this local time.
    Stamped(DateTime<Local>),
    /// The probe failed, timed out, or printed nothing parseable.
    Unavailable,
}

/// Parse a probe output line. Leading/trailing whitespace is tolerated,
/// anything else unparseable is not.
fn parse_stamp(line: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(line.trim(), STAMP_FORMAT).ok()?;
    Local.from_local_datetime(&naive).earliest()
}

/// Invoke the heartbeat query command and interpret its output.
///
/// The invocation is bounded by `timeout_secs`; a hung probe is killed and
/// reported as `Unavailable` rather than stalling the tick loop. Spawn
/// failures and malformed output are likewise `Unavailable`: a broken query
/// path is exactly what the monitor's failure counter exists to count, so
/// nothing here is a hard error.
pub async fn read_heartbeat(cfg: &ProbeConfig) -> ProbeReading {
    let mut cmd = Command::new(&cfg.command);
    cmd.args(&cfg.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(cfg.timeout_secs), cmd.output()).await;
    let output = match output {
        Err(_) => {
            tracing::warn!(
                command = %cfg.command,
                timeout_secs = cfg.timeout_secs,
                "heartbeat probe timed out"
            );
            return ProbeReading::Unavailable;
        }
        Ok(Err(e)) => {
            tracing::warn!(
                command = %cfg.command,
                error = %e,
                "failed to run heartbeat probe"
            );
            return ProbeReading::Unavailable;
        }
        Ok(Ok(output)) => output,
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let first_line = stdout.lines().next().unwrap_or("");
    match parse_stamp(first_line) {
        Some(stamp) => ProbeReading::Stamped(stamp),
        None => {
            tracing::debug!(line = first_line, "probe output is not a timestamp");
            ProbeReading::Unavailable
        }
    }
}
