use std::time::Duration;

use tracing::{debug, info, warn};

use super::pattern::Pattern;
use super::source::{ProcessRecord, ProcessSource, SystemProcessSource};
use crate::error::Result;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_millis(500);

/// Patterns tried in order against each process's command.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "Cursor.exe",
    "Cursor ",
    "cursor ",
    "cursor",
    "Cursor",
    "*cursor*",
    "*Cursor*",
];

/// Rows containing any of these are this tool or its helpers, never targets.
pub const DEFAULT_SELF_MARKERS: &[&str] = &[
    "cursor-id-modifier",
    "cursor-helper",
    env!("CARGO_PKG_NAME"),
];

#[derive(Debug, Clone)]
pub struct TerminatorConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Wait between the graceful stop request and the forced kill.
    pub grace_delay: Duration,
    pub patterns: Vec<String>,
    pub self_markers: Vec<String>,
}

impl Default for TerminatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            grace_delay: DEFAULT_GRACE_DELAY,
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            self_markers: DEFAULT_SELF_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Result of [`ProcessTerminator::ensure_stopped`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub stopped: bool,
    /// Matching processes still alive after the last attempt.
    pub residual: Vec<ProcessRecord>,
    /// Discover-and-kill cycles actually run.
    pub attempts: u32,
}

/// Finds and terminates processes whose command matches the configured
/// patterns. Holds no mutable state, so one instance may be shared freely.
pub struct ProcessTerminator<S = SystemProcessSource> {
    source: S,
    patterns: Vec<Pattern>,
    self_markers: Vec<String>,
    config: TerminatorConfig,
}

impl ProcessTerminator<SystemProcessSource> {
    /// Terminator for the host OS. Fails on platforms without a listing command.
    pub fn system(config: TerminatorConfig) -> Result<Self> {
        Ok(Self::new(SystemProcessSource::new()?, config))
    }
}

impl<S: ProcessSource> ProcessTerminator<S> {
    pub fn new(source: S, config: TerminatorConfig) -> Self {
        Self {
            source,
            patterns: config.patterns.iter().map(|p| Pattern::parse(p)).collect(),
            self_markers: config.self_markers.iter().map(|m| m.to_lowercase()).collect(),
            config,
        }
    }

    fn is_own_process(&self, record: &ProcessRecord) -> bool {
        if record.pid == std::process::id().to_string() {
            return true;
        }
        let line = record.raw_line.to_lowercase();
        self.self_markers.iter().any(|marker| line.contains(marker.as_str()))
    }

    fn is_target(&self, record: &ProcessRecord) -> bool {
        !self.is_own_process(record) && self.patterns.iter().any(|p| p.matches(&record.command))
    }

    /// Current processes matching the patterns, excluding this tool.
    pub async fn list_matching(&self) -> Result<Vec<ProcessRecord>> {
        let records = self.source.list().await?;
        Ok(records.into_iter().filter(|r| self.is_target(r)).collect())
    }

    pub async fn is_running(&self) -> Result<bool> {
        Ok(!self.list_matching().await?.is_empty())
    }

    /// [`Self::ensure_stopped`] with the configured attempts and delay.
    pub async fn stop_all(&self) -> Result<StopOutcome> {
        self.ensure_stopped(self.config.max_attempts, self.config.retry_delay)
            .await
    }

    /// Repeats discover → graceful stop → forced kill up to `max_attempts`
    /// times. Processes that survive every attempt are reported in
    /// [`StopOutcome::residual`] rather than as an error; only a failed
    /// enumeration aborts early.
    pub async fn ensure_stopped(
        &self,
        max_attempts: u32,
        retry_delay: Duration,
    ) -> Result<StopOutcome> {
        for attempt in 1..=max_attempts {
            let running = self.list_matching().await?;
            if running.is_empty() {
                debug!(attempt, "No matching processes running");
                return Ok(StopOutcome {
                    stopped: true,
                    residual: Vec::new(),
                    attempts: attempt - 1,
                });
            }

            info!(
                attempt,
                max_attempts,
                count = running.len(),
                "Stopping matching processes"
            );

            for record in &running {
                if let Err(e) = self.source.request_stop(&record.pid).await {
                    debug!(pid = %record.pid, error = %e, "Graceful stop request failed");
                }
            }
            tokio::time::sleep(self.config.grace_delay).await;

            for record in self.list_matching().await? {
                if let Err(e) = self.source.force_kill(&record.pid).await {
                    warn!(pid = %record.pid, error = %e, "Failed to kill process");
                }
            }
            tokio::time::sleep(retry_delay).await;
        }

        let residual = self.list_matching().await?;
        if !residual.is_empty() {
            warn!(count = residual.len(), max_attempts, "Processes still running after all attempts");
        }
        Ok(StopOutcome {
            stopped: residual.is_empty(),
            residual,
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        lists: usize,
        stops: Vec<String>,
        kills: Vec<String>,
    }

    /// In-memory process table.
    struct FakeSource {
        table: Mutex<Vec<ProcessRecord>>,
        calls: Mutex<Calls>,
        exits_on_stop: bool,
        exits_on_kill: bool,
        fail_listing: bool,
    }

    impl FakeSource {
        fn new(table: Vec<ProcessRecord>) -> Self {
            Self {
                table: Mutex::new(table),
                calls: Mutex::new(Calls::default()),
                exits_on_stop: false,
                exits_on_kill: false,
                fail_listing: false,
            }
        }

        fn remove(&self, pid: &str) {
            self.table.lock().unwrap().retain(|r| r.pid != pid);
        }
    }

    #[async_trait]
    impl ProcessSource for FakeSource {
        async fn list(&self) -> Result<Vec<ProcessRecord>> {
            self.calls.lock().unwrap().lists += 1;
            if self.fail_listing {
                return Err(Error::Enumeration("ps exited with Some(1)".into()));
            }
            Ok(self.table.lock().unwrap().clone())
        }

        async fn request_stop(&self, pid: &str) -> Result<()> {
            self.calls.lock().unwrap().stops.push(pid.to_string());
            if self.exits_on_stop {
                self.remove(pid);
            }
            Ok(())
        }

        async fn force_kill(&self, pid: &str) -> Result<()> {
            self.calls.lock().unwrap().kills.push(pid.to_string());
            if self.exits_on_kill {
                self.remove(pid);
                Ok(())
            } else {
                Err(Error::Termination {
                    pid: pid.to_string(),
                    reason: "operation not permitted".into(),
                })
            }
        }
    }

    fn record(pid: &str, command: &str) -> ProcessRecord {
        ProcessRecord {
            pid: pid.to_string(),
            raw_line: format!("{pid} ? 00:00:01 {command}"),
            command: command.to_string(),
        }
    }

    fn fast_config() -> TerminatorConfig {
        TerminatorConfig {
            grace_delay: Duration::ZERO,
            retry_delay: Duration::from_millis(1),
            ..TerminatorConfig::default()
        }
    }

    fn desktop_table() -> Vec<ProcessRecord> {
        vec![
            record("1", "systemd"),
            record("100", "cursor"),
            record("101", "/opt/Cursor/cursor --type=renderer"),
            record("200", "bash"),
            record("300", "cursor-id-reset --read-only"),
        ]
    }

    #[tokio::test]
    async fn list_matching_filters_by_pattern_and_excludes_self() {
        let terminator = ProcessTerminator::new(FakeSource::new(desktop_table()), fast_config());
        let pids: Vec<String> = terminator
            .list_matching()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.pid)
            .collect();
        assert_eq!(pids, vec!["100", "101"]);
    }

    #[tokio::test]
    async fn nothing_running_succeeds_without_killing() {
        let source = FakeSource::new(vec![record("1", "systemd")]);
        let terminator = ProcessTerminator::new(source, fast_config());

        let outcome = terminator.ensure_stopped(3, Duration::from_millis(1)).await.unwrap();

        assert!(outcome.stopped);
        assert!(outcome.residual.is_empty());
        assert_eq!(outcome.attempts, 0);
        let calls = terminator.source.calls.lock().unwrap();
        assert_eq!(calls.lists, 1);
        assert!(calls.stops.is_empty() && calls.kills.is_empty());
    }

    #[tokio::test]
    async fn graceful_stop_ends_after_one_cycle() {
        let mut source = FakeSource::new(desktop_table());
        source.exits_on_stop = true;
        let terminator = ProcessTerminator::new(source, fast_config());

        let outcome = terminator.ensure_stopped(3, Duration::from_millis(1)).await.unwrap();

        assert!(outcome.stopped);
        assert_eq!(outcome.attempts, 1);
        let calls = terminator.source.calls.lock().unwrap();
        assert_eq!(calls.stops, vec!["100", "101"]);
        assert!(calls.kills.is_empty());
    }

    #[tokio::test]
    async fn survivors_of_graceful_stop_are_force_killed() {
        let mut source = FakeSource::new(desktop_table());
        source.exits_on_kill = true;
        let terminator = ProcessTerminator::new(source, fast_config());

        let outcome = terminator.stop_all().await.unwrap();

        assert!(outcome.stopped);
        assert_eq!(outcome.attempts, 1);
        let calls = terminator.source.calls.lock().unwrap();
        assert_eq!(calls.kills, vec!["100", "101"]);
        assert!(!calls.kills.contains(&"300".to_string()));
    }

    #[tokio::test]
    async fn stubborn_processes_exhaust_attempts_without_error() {
        let terminator = ProcessTerminator::new(FakeSource::new(desktop_table()), fast_config());

        let outcome = terminator.ensure_stopped(3, Duration::from_millis(1)).await.unwrap();

        assert!(!outcome.stopped);
        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.residual.len(), 2);
        let calls = terminator.source.calls.lock().unwrap();
        assert_eq!(calls.stops.len(), 3 * 2);
        assert_eq!(calls.kills.len(), 3 * 2);
        // two listings per cycle plus the final check
        assert_eq!(calls.lists, 3 * 2 + 1);
    }

    #[tokio::test]
    async fn enumeration_failure_aborts_immediately() {
        let mut source = FakeSource::new(desktop_table());
        source.fail_listing = true;
        let terminator = ProcessTerminator::new(source, fast_config());

        let err = terminator.ensure_stopped(3, Duration::from_millis(1)).await.unwrap_err();

        assert!(matches!(err, Error::Enumeration(_)));
        assert_eq!(terminator.source.calls.lock().unwrap().lists, 1);
    }

    #[tokio::test]
    async fn exact_patterns_do_not_match_substrings() {
        let config = TerminatorConfig {
            patterns: vec!["Cursor".into()],
            ..fast_config()
        };
        let table = vec![record("10", "Cursor"), record("11", "cursorish")];
        let terminator = ProcessTerminator::new(FakeSource::new(table), config);

        let matching = terminator.list_matching().await.unwrap();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].pid, "10");
        assert!(terminator.is_running().await.unwrap());
    }

    #[tokio::test]
    async fn own_pid_is_never_a_target() {
        let own = std::process::id().to_string();
        let table = vec![record(&own, "cursor")];
        let terminator = ProcessTerminator::new(FakeSource::new(table), fast_config());
        assert!(!terminator.is_running().await.unwrap());
    }
}
