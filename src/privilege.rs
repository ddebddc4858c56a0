//! Administrator / root privilege checks.

use crate::error::Result;

/// Hidden flag passed to the elevated child in place of `AUTOMATED_MODE=1`.
pub const AUTOMATED_FLAG: &str = "--automated";

/// Whether the process can write another user's application data.
#[cfg(unix)]
pub fn is_elevated() -> Result<bool> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    tracing::trace!(euid, "Checked effective uid");
    Ok(euid == 0)
}

/// Whether the process can write another user's application data.
#[cfg(windows)]
pub fn is_elevated() -> Result<bool> {
    use std::process::{Command, Stdio};

    // `net session` is refused without an elevated token.
    let elevated = Command::new("net")
        .arg("session")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success());
    tracing::trace!(elevated, "Checked net session");
    Ok(elevated)
}

#[cfg(not(any(unix, windows)))]
pub fn is_elevated() -> Result<bool> {
    Err(crate::error::Error::UnsupportedPlatform(
        std::env::consts::OS.to_string(),
    ))
}

/// Arguments for the elevated child: the current ones plus [`AUTOMATED_FLAG`].
pub fn relaunch_args(current: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut args: Vec<String> = current
        .into_iter()
        .filter(|arg| arg != AUTOMATED_FLAG)
        .collect();
    args.push(AUTOMATED_FLAG.to_string());
    args
}

/// Single-quoted PowerShell literal; embedded quotes are doubled.
pub fn powershell_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One `-ArgumentList` entry. Start-Process joins entries with spaces, so
/// values containing whitespace keep their own double quotes.
pub fn powershell_argument(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        powershell_literal(&format!("\"{}\"", value))
    } else {
        powershell_literal(value)
    }
}

/// Starts this executable again through the UAC prompt and returns once the
/// elevated copy has been launched.
#[cfg(windows)]
pub async fn relaunch_elevated() -> Result<()> {
    use crate::error::Error;
    use tokio::process::Command;

    let exe = std::env::current_exe()
        .map_err(|e| Error::io("failed to locate current executable", "", e))?;
    let args = relaunch_args(std::env::args().skip(1));
    let argument_list = args
        .iter()
        .map(|arg| powershell_argument(arg))
        .collect::<Vec<_>>()
        .join(",");
    let script = format!(
        "Start-Process -FilePath {} -ArgumentList {} -Verb RunAs",
        powershell_literal(&exe.to_string_lossy()),
        argument_list
    );
    tracing::debug!(script = %script, "Requesting elevation");

    let status = Command::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command", &script])
        .status()
        .await
        .map_err(|e| Error::Elevation(format!("failed to execute powershell: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Elevation(format!(
            "powershell exited with {:?}",
            status.code()
        )))
    }
}
