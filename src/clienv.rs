use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::process::Platform;
use crate::storage::FileOwner;

const STORAGE_PATH_VAR: &str = "CURSOR_STORAGE_PATH";
const AUTOMATED_MODE_VAR: &str = "AUTOMATED_MODE";
const SUDO_USER_VAR: &str = "SUDO_USER";
const SUDO_UID_VAR: &str = "SUDO_UID";
const SUDO_GID_VAR: &str = "SUDO_GID";
const USER_VARS: &[&str] = &["USER", "USERNAME", "LOGNAME"];
const APPDATA_VAR: &str = "APPDATA";
const LOCALE_VARS: &[&str] = &["LANG", "LANGUAGE", "LC_ALL"];

const CURSOR_STORAGE: &[&str] = &["Cursor", "User", "globalStorage", "storage.json"];

/// Value of `name` if set and non-empty.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Explicit storage.json location ($CURSOR_STORAGE_PATH)
pub fn storage_path_override() -> Option<PathBuf> {
    let val = env_opt(STORAGE_PATH_VAR).map(PathBuf::from);
    tracing::trace!(value = ?val, "CURSOR_STORAGE_PATH env var");
    val
}

/// Set by the elevated child process ($AUTOMATED_MODE=1)
pub fn automated_mode() -> bool {
    let automated = env_opt(AUTOMATED_MODE_VAR).is_some_and(|v| v.trim() == "1");
    tracing::trace!(automated, "AUTOMATED_MODE env var");
    automated
}

/// The user whose Cursor installation is targeted: the invoking user under
/// sudo ($SUDO_USER), otherwise the current login.
pub fn target_user() -> Result<String> {
    let user = env_opt(SUDO_USER_VAR)
        .or_else(|| USER_VARS.iter().find_map(|var| env_opt(var)))
        .ok_or_else(|| Error::UserLookup("none of SUDO_USER, USER, USERNAME, LOGNAME is set".into()))?;
    tracing::trace!(user = %user, "Resolved target user");
    Ok(user)
}

/// The invoking user's uid/gid under sudo ($SUDO_UID, $SUDO_GID).
pub fn sudo_owner() -> Option<FileOwner> {
    let owner = parse_owner(env_opt(SUDO_UID_VAR), env_opt(SUDO_GID_VAR));
    tracing::trace!(owner = ?owner, "SUDO_UID / SUDO_GID env vars");
    owner
}

fn parse_owner(uid: Option<String>, gid: Option<String>) -> Option<FileOwner> {
    Some(FileOwner {
        uid: uid?.trim().parse().ok()?,
        gid: gid?.trim().parse().ok()?,
    })
}

/// Locale-related environment values ($LANG, $LANGUAGE, $LC_ALL) that are set.
pub fn locale_values() -> Vec<String> {
    LOCALE_VARS.iter().filter_map(|var| env_opt(var)).collect()
}

/// Home directory on Unix platforms. Under sudo the invoking user's
/// conventional home is used instead of root's; otherwise `home`, and only
/// without one is the login name looked up.
fn unix_home(platform: Platform, sudo_user: Option<&str>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(user) = sudo_user {
        return Ok(conventional_home(platform, user));
    }
    if let Some(home) = home {
        return Ok(home);
    }
    Ok(conventional_home(platform, &target_user()?))
}

fn conventional_home(platform: Platform, user: &str) -> PathBuf {
    match platform {
        Platform::MacOs if user == "root" => PathBuf::from("/var/root"),
        Platform::MacOs => Path::new("/Users").join(user),
        _ if user == "root" => PathBuf::from("/root"),
        _ => Path::new("/home").join(user),
    }
}

/// `<base>/Cursor/User/globalStorage/storage.json`, where `base` is
/// `%APPDATA%` on Windows, `~/Library/Application Support` on macOS and
/// `~/.config` on Linux.
pub fn storage_path_in(platform: Platform, home_or_appdata: &Path) -> PathBuf {
    let base = match platform {
        Platform::Windows => home_or_appdata.to_path_buf(),
        Platform::MacOs => home_or_appdata.join("Library").join("Application Support"),
        Platform::Linux => home_or_appdata.join(".config"),
    };
    CURSOR_STORAGE.iter().fold(base, |path, part| path.join(part))
}

/// Resolved storage.json path ($CURSOR_STORAGE_PATH or the platform default)
pub fn storage_path() -> Result<PathBuf> {
    if let Some(path) = storage_path_override() {
        return Ok(path);
    }

    let platform = Platform::current()?;
    let base = match platform {
        Platform::Windows => env_opt(APPDATA_VAR)
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
            .ok_or_else(|| Error::UserLookup("APPDATA is not set".into()))?,
        Platform::MacOs | Platform::Linux => unix_home(
            platform,
            env_opt(SUDO_USER_VAR).as_deref(),
            dirs::home_dir(),
        )?,
    };

    let path = storage_path_in(platform, &base);
    tracing::trace!(path = %path.display(), "Resolved storage path");
    Ok(path)
}
