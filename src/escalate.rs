/// Escalation actions: advisory hooks, soft kill of the hub process, and the
/// hard reboot path. All side effects here are externally visible and
/// irreversible — there is no retry and no rollback.
use crate::config::WatchConfig;
use crate::process;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// What an escalation actually did, for the tick loop to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// SIGTERM was sent to the hub process; the loop keeps ticking.
    Killed { pid: i32 },
    /// The reboot command was issued; the loop must stop.
    RebootIssued,
}

/// Run an advisory hook executable. The hook is cleanup, not a gate:
/// a missing or failing hook is logged and the escalation proceeds.
async fn run_hook(path: &Path) {
    match Command::new(path).output().await {
        Ok(output) if output.status.success() => {
            debug!(hook = %path.display(), "hook completed");
        }
        Ok(output) => {
            warn!(
                hook = %path.display(),
                status = ?output.status.code(),
                "hook exited nonzero, continuing"
            );
        }
        Err(e) => {
            warn!(hook = %path.display(), error = %e, "hook not run, continuing");
        }
    }
}

/// Soft escalation: terminate the canonical hub process.
///
/// The candidate is read fresh from the process table here, never reused
/// from an earlier tick, since a supervisor may have respawned the hub.
/// If no instance exists at all there is nothing to kill and nothing left
/// to recover, so this promotes itself to a hard escalation.
pub async fn soft_escalate(cfg: &WatchConfig) -> EscalationOutcome {
    match process::select_canonical(&cfg.process.name) {
        Some(candidate) => {
            info!(
                pid = candidate.pid,
                start_ticks = candidate.start_ticks,
                "terminating stalled hub process"
            );
            run_hook(&cfg.hooks.before_kill).await;
            if let Err(e) = kill(Pid::from_raw(candidate.pid), Signal::SIGTERM) {
                // Most likely the process exited between scan and signal.
                warn!(pid = candidate.pid, error = %e, "SIGTERM not delivered");
            }
            EscalationOutcome::Killed { pid: candidate.pid }
        }
        None => {
            error!(
                process = %cfg.process.name,
                "no hub process found to kill, rebooting instead"
            );
            hard_escalate(cfg).await
        }
    }
}

/// Hard escalation: reboot the host.
///
/// The reboot command is spawned and not awaited; the host going down is
/// the completion. The caller stops ticking; the hardware watchdog stays
/// armed as the backstop in case the reboot itself wedges.
pub async fn hard_escalate(cfg: &WatchConfig) -> EscalationOutcome {
    run_hook(&cfg.hooks.before_reboot).await;
    error!(command = %cfg.escalation.reboot_command, "issuing host reboot");
    match Command::new(&cfg.escalation.reboot_command)
        .args(&cfg.escalation.reboot_args)
        .spawn()
    {
        Ok(_) => {}
        Err(e) => {
            error!(
                command = %cfg.escalation.reboot_command,
                error = %e,
                "reboot command failed to start"
            );
        }
    }
    EscalationOutcome::RebootIssued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EscalationConfig, HooksConfig, ProcessConfig, WatchConfig};
    use std::os::unix::process::ExitStatusExt;
    use std::path::PathBuf;

    /// Config whose reboot command and hooks are harmless no-ops.
    fn harmless_cfg(process_name: &str) -> WatchConfig {
        WatchConfig {
            process: ProcessConfig {
                name: process_name.to_string(),
            },
            hooks: HooksConfig {
                before_kill: PathBuf::from("/bin/true"),
                before_reboot: PathBuf::from("/bin/true"),
            },
            escalation: EscalationConfig {
                reboot_command: "true".to_string(),
                reboot_args: vec![],
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_hook_missing_executable_is_tolerated() {
        run_hook(Path::new("/nonexistent/hook")).await;
    }

    #[tokio::test]
    async fn test_run_hook_failing_executable_is_tolerated() {
        run_hook(Path::new("/bin/false")).await;
    }

    #[tokio::test]
    async fn test_hard_escalate_reports_reboot() {
        let outcome = hard_escalate(&harmless_cfg("anything")).await;
        assert_eq!(outcome, EscalationOutcome::RebootIssued);
    }

    #[tokio::test]
    async fn test_hard_escalate_survives_missing_reboot_command() {
        let mut cfg = harmless_cfg("anything");
        cfg.escalation.reboot_command = "/nonexistent/reboot".to_string();
        // Still reports issued: the loop must stop either way.
        let outcome = hard_escalate(&cfg).await;
        assert_eq!(outcome, EscalationOutcome::RebootIssued);
    }

    #[tokio::test]
    async fn test_soft_escalate_without_candidate_promotes_to_reboot() {
        let cfg = harmless_cfg("no-such-process-name-zzz");
        let outcome = soft_escalate(&cfg).await;
        assert_eq!(outcome, EscalationOutcome::RebootIssued);
    }

    #[tokio::test]
    async fn test_soft_escalate_terminates_newest_match() {
        // Each process-killing test targets a unique binary name so the
        // newest-match selection can't cross over between parallel tests.
        let mut child = tokio::process::Command::new("cat")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .spawn()
            .unwrap();
        let child_pid = child.id().unwrap() as i32;

        let cfg = harmless_cfg("cat");
        let outcome = soft_escalate(&cfg).await;
        assert_eq!(outcome, EscalationOutcome::Killed { pid: child_pid });

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn test_soft_escalate_missing_hook_still_kills() {
        let mut child = tokio::process::Command::new("dd")
            .args(["if=/dev/zero", "of=/dev/null"])
            .stderr(std::process::Stdio::null())
            .spawn()
            .unwrap();
        let child_pid = child.id().unwrap() as i32;

        let mut cfg = harmless_cfg("dd");
        cfg.hooks.before_kill = PathBuf::from("/nonexistent/before-kill");
        let outcome = soft_escalate(&cfg).await;
        assert_eq!(outcome, EscalationOutcome::Killed { pid: child_pid });

        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
    }
}
