/// Process-table scan: find the canonical hub process to act on.
use procfs::process::all_processes;

/// A live process matching the monitored name, read fresh from the process
/// table at each kill decision and discarded immediately after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessCandidate {
    pub pid: i32,
    /// Start time in kernel ticks since boot; only relative order matters.
    pub start_ticks: u64,
}

/// Reduce candidates to the most recently started one.
///
/// Strict `>` keeps the first-seen candidate on a start-tick tie; which one
/// wins a tie is not defined, and doesn't need to be (two instances started
/// in the same kernel tick is pathological either way).
fn newest(candidates: impl IntoIterator<Item = ProcessCandidate>) -> Option<ProcessCandidate> {
    candidates.into_iter().fold(None, |best, candidate| {
        match best {
            Some(b) if candidate.start_ticks > b.start_ticks => Some(candidate),
            None => Some(candidate),
            keep => keep,
        }
    })
}

/// Scan the process table for processes named exactly `name` and pick the
/// most recently started instance.
///
/// When a supervisor respawns the hub, stale instances may linger while
/// shutting down; the newest one is the instance actually serving, so that
/// is the one a kill must target. Returns `None` when nothing matches,
/// i.e. the hub isn't running at all, which callers treat as its own fault.
///
/// Entries that vanish mid-scan are skipped; a single unreadable entry
/// never fails the whole scan.
pub fn select_canonical(name: &str) -> Option<ProcessCandidate> {
    let processes = match all_processes() {
        Ok(iter) => iter,
        Err(e) => {
            tracing::error!(error = %e, "cannot enumerate process table");
            return None;
        }
    };

    let matches = processes.filter_map(|entry| {
        let process = entry.ok()?;
        let stat = process.stat().ok()?;
        (stat.comm == name && stat.pid > 1).then_some(ProcessCandidate {
            pid: stat.pid,
            start_ticks: stat.starttime,
        })
    });
    newest(matches)
}
