use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// One row of the platform's process listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: String,
    /// The listing row as printed by the OS tool.
    pub raw_line: String,
    /// Image name (Windows) or command column (Unix).
    pub command: String,
}

/// Enumerates and signals OS processes.
#[async_trait]
pub trait ProcessSource: Send + Sync {
    /// All processes currently visible, one record per parsable row.
    async fn list(&self) -> Result<Vec<ProcessRecord>>;

    /// Ask the process to exit on its own.
    async fn request_stop(&self, pid: &str) -> Result<()>;

    /// Kill the process unconditionally.
    async fn force_kill(&self, pid: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

/// Columns before the command on `ps -A` / `ps -ax` rows: PID, TTY, TIME.
const PS_LEADING_COLUMNS: usize = 3;

impl Platform {
    pub fn current() -> Result<Self> {
        if cfg!(target_os = "windows") {
            Ok(Platform::Windows)
        } else if cfg!(target_os = "macos") {
            Ok(Platform::MacOs)
        } else if cfg!(target_os = "linux") {
            Ok(Platform::Linux)
        } else {
            Err(Error::UnsupportedPlatform(std::env::consts::OS.to_string()))
        }
    }

    fn list_command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Platform::Windows => ("tasklist", &["/FO", "CSV", "/NH"]),
            Platform::MacOs => ("ps", &["-ax"]),
            Platform::Linux => ("ps", &["-A"]),
        }
    }

    fn stop_command(&self, pid: &str) -> (&'static str, Vec<String>) {
        match self {
            Platform::Windows => ("taskkill", vec!["/PID".into(), pid.into()]),
            Platform::MacOs | Platform::Linux => ("kill", vec!["-TERM".into(), pid.into()]),
        }
    }

    fn kill_command(&self, pid: &str) -> (&'static str, Vec<String>) {
        match self {
            Platform::Windows => ("taskkill", vec!["/F".into(), "/PID".into(), pid.into()]),
            Platform::MacOs | Platform::Linux => ("kill", vec!["-9".into(), pid.into()]),
        }
    }

    /// Parses one listing row. Headers, blank lines and rows without a
    /// numeric PID yield `None`.
    pub fn parse_row(&self, line: &str) -> Option<ProcessRecord> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let (pid, command) = match self {
            // "Image Name","PID","Session Name","Session#","Mem Usage"
            Platform::Windows => {
                let inner = trimmed.strip_prefix('"')?.strip_suffix('"')?;
                let mut fields = inner.split("\",\"");
                let image = fields.next()?;
                let pid = fields.next()?;
                (pid.to_string(), image.to_string())
            }
            Platform::MacOs | Platform::Linux => {
                let mut tokens = trimmed.split_whitespace();
                let pid = tokens.next()?;
                let command = tokens
                    .skip(PS_LEADING_COLUMNS - 1)
                    .collect::<Vec<_>>()
                    .join(" ");
                if command.is_empty() {
                    return None;
                }
                (pid.to_string(), command)
            }
        };

        if pid.is_empty() || !pid.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(ProcessRecord {
            pid,
            raw_line: trimmed.to_string(),
            command,
        })
    }

    /// Parses the full listing output. Output with content but no parsable
    /// row at all is an enumeration error.
    pub fn parse_listing(&self, output: &str) -> Result<Vec<ProcessRecord>> {
        let mut saw_content = false;
        let mut records = Vec::new();
        for line in output.lines() {
            if line.trim().is_empty() {
                continue;
            }
            saw_content = true;
            if let Some(record) = self.parse_row(line) {
                records.push(record);
            }
        }

        if saw_content && records.is_empty() {
            return Err(Error::Enumeration(format!(
                "no process rows could be parsed from {} output",
                self.list_command().0
            )));
        }
        Ok(records)
    }
}

/// [`ProcessSource`] backed by the OS listing and kill commands.
#[derive(Debug, Clone)]
pub struct SystemProcessSource {
    platform: Platform,
}

impl SystemProcessSource {
    pub fn new() -> Result<Self> {
        Ok(Self::for_platform(Platform::current()?))
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self { platform }
    }

    async fn signal(&self, pid: &str, (cmd, args): (&'static str, Vec<String>)) -> Result<()> {
        debug!("Running {} {:?}", cmd, args);
        let output = Command::new(cmd)
            .args(&args)
            .output()
            .await
            .map_err(|e| Error::Termination {
                pid: pid.to_string(),
                reason: format!("{cmd}: {e}"),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Termination {
                pid: pid.to_string(),
                reason: format!(
                    "{cmd} exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }
}

#[async_trait]
impl ProcessSource for SystemProcessSource {
    async fn list(&self) -> Result<Vec<ProcessRecord>> {
        let (cmd, args) = self.platform.list_command();
        trace!(cmd, ?args, "Listing processes");

        let output = Command::new(cmd)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::Enumeration(format!("failed to execute {cmd}: {e}")))?;

        if !output.status.success() {
            return Err(Error::Enumeration(format!(
                "{cmd} exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let records = self.platform.parse_listing(&stdout)?;
        trace!(count = records.len(), "Processes listed");
        Ok(records)
    }

    async fn request_stop(&self, pid: &str) -> Result<()> {
        self.signal(pid, self.platform.stop_command(pid)).await
    }

    async fn force_kill(&self, pid: &str) -> Result<()> {
        self.signal(pid, self.platform.kill_command(pid)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINUX_PS: &str = "    PID TTY          TIME CMD
      1 ?        00:00:03 systemd
   4242 ?        00:01:10 cursor
   4243 ?        00:00:02 cursor --type=gpu-process
   5000 pts/0    00:00:00 bash
";

    const MAC_PS: &str = "  PID TTY           TIME CMD
    1 ??         2:13.93 /sbin/launchd
  812 ??         0:42.10 /Applications/Cursor.app/Contents/MacOS/Cursor
";

    const TASKLIST: &str = "\"System Idle Process\",\"0\",\"Services\",\"0\",\"8 K\"
\"Cursor.exe\",\"10244\",\"Console\",\"1\",\"182,540 K\"
";

    #[test]
    fn parses_linux_rows_and_skips_header() {
        let rows = Platform::Linux.parse_listing(LINUX_PS).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].pid, "4242");
        assert_eq!(rows[1].command, "cursor");
        assert_eq!(rows[2].command, "cursor --type=gpu-process");
        assert!(rows[1].raw_line.starts_with("4242 "));
        assert!(rows[1].raw_line.ends_with(" cursor"));
    }

    #[test]
    fn parses_macos_rows() {
        let rows = Platform::MacOs.parse_listing(MAC_PS).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pid, "812");
        assert_eq!(rows[1].command, "/Applications/Cursor.app/Contents/MacOS/Cursor");
    }

    #[test]
    fn parses_tasklist_csv() {
        let rows = Platform::Windows.parse_listing(TASKLIST).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].pid, "10244");
        assert_eq!(rows[1].command, "Cursor.exe");
    }

    #[test]
    fn empty_output_is_not_an_error() {
        assert!(Platform::Linux.parse_listing("").unwrap().is_empty());
        assert!(Platform::Windows.parse_listing("\r\n").unwrap().is_empty());
    }

    #[test]
    fn unparsable_output_is_enumeration_error() {
        let err = Platform::Linux
            .parse_listing("error: unsupported option\nusage: ps [options]\n")
            .unwrap_err();
        assert!(matches!(err, Error::Enumeration(_)));

        let err = Platform::Windows
            .parse_listing("INFO: No tasks are running which match the specified criteria.")
            .unwrap_err();
        assert!(matches!(err, Error::Enumeration(_)));
    }

    #[test]
    fn rows_without_numeric_pid_are_skipped() {
        assert!(Platform::Linux.parse_row("abc ? 00:00:00 cursor").is_none());
        assert!(Platform::Windows
            .parse_row("\"Cursor.exe\",\"N/A\",\"Console\",\"1\",\"1 K\"")
            .is_none());
    }

    #[test]
    fn kill_commands_are_platform_specific() {
        assert_eq!(
            Platform::Windows.kill_command("7"),
            ("taskkill", vec!["/F".to_string(), "/PID".to_string(), "7".to_string()])
        );
        assert_eq!(
            Platform::Linux.kill_command("7"),
            ("kill", vec!["-9".to_string(), "7".to_string()])
        );
        assert_eq!(
            Platform::MacOs.stop_command("7"),
            ("kill", vec!["-TERM".to_string(), "7".to_string()])
        );
    }

    #[test]
    fn current_platform_is_supported_on_test_hosts() {
        assert!(Platform::current().is_ok());
    }
}
