//! Cursor's `storage.json`: read, merge and atomic replace.
//!
//! The document is kept as an ordered JSON object so that keys this tool does
//! not know about survive every write in their original order. Writes always
//! merge onto the file as it is on disk at the moment of writing, never onto a
//! copy the caller read earlier.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};

pub const MAC_MACHINE_ID_KEY: &str = "telemetry.macMachineId";
pub const MACHINE_ID_KEY: &str = "telemetry.machineId";
pub const DEV_DEVICE_ID_KEY: &str = "telemetry.devDeviceId";
pub const SQM_ID_KEY: &str = "telemetry.sqmId";
pub const LAST_MODIFIED_KEY: &str = "lastModified";

const INDENT: &[u8] = b"    ";
const TEMP_SUFFIX: &str = ".tmp";

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;
#[cfg(unix)]
const READ_ONLY_MODE: u32 = 0o444;

/// The four telemetry identifiers written into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryIds {
    pub mac_machine_id: String,
    pub machine_id: String,
    pub dev_device_id: String,
    pub sqm_id: String,
}

/// Ordered key/value view of `storage.json` with typed accessors for the
/// telemetry fields. Unknown keys are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigDocument {
    entries: Map<String, Value>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn mac_machine_id(&self) -> Option<&str> {
        self.str_field(MAC_MACHINE_ID_KEY)
    }

    pub fn machine_id(&self) -> Option<&str> {
        self.str_field(MACHINE_ID_KEY)
    }

    pub fn dev_device_id(&self) -> Option<&str> {
        self.str_field(DEV_DEVICE_ID_KEY)
    }

    pub fn sqm_id(&self) -> Option<&str> {
        self.str_field(SQM_ID_KEY)
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.str_field(LAST_MODIFIED_KEY)
    }

    /// Overwrites the telemetry fields and the `lastModified` stamp. Existing
    /// keys keep their position; missing ones are appended.
    pub fn apply(&mut self, ids: &TelemetryIds, last_modified: &str) {
        self.insert(SQM_ID_KEY, Value::from(ids.sqm_id.as_str()));
        self.insert(MAC_MACHINE_ID_KEY, Value::from(ids.mac_machine_id.as_str()));
        self.insert(MACHINE_ID_KEY, Value::from(ids.machine_id.as_str()));
        self.insert(DEV_DEVICE_ID_KEY, Value::from(ids.dev_device_id.as_str()));
        self.insert(LAST_MODIFIED_KEY, Value::from(last_modified));
    }

    fn to_pretty_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }
}

/// Current UTC time as RFC 3339 with second precision, e.g. `2024-05-01T08:30:00Z`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Unix owner given to files and directories the store creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOwner {
    pub uid: u32,
    pub gid: u32,
}

/// Owner of one `storage.json` path.
///
/// Reads share the lock; a write holds it exclusively from the refresh read
/// through the final rename.
///
/// The replacement file keeps the owner of the file it replaces. New files
/// and created directories get [`ConfigStore::with_owner`]'s owner, so a run
/// as root on behalf of a user leaves everything writable by that user.
pub struct ConfigStore {
    path: PathBuf,
    #[cfg_attr(not(unix), allow(dead_code))]
    owner: Option<FileOwner>,
    lock: RwLock<()>,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner: None,
            lock: RwLock::new(()),
        }
    }

    pub fn with_owner(mut self, owner: Option<FileOwner>) -> Self {
        self.owner = owner;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist.
    pub fn read(&self) -> Result<Option<ConfigDocument>> {
        let _guard = self.lock.read().expect("ConfigStore lock poisoned");
        self.load()
    }

    /// Merges `ids` into the document currently on disk and atomically
    /// replaces the file. Returns the document that was written.
    pub fn write(&self, ids: &TelemetryIds, read_only: bool) -> Result<ConfigDocument> {
        let _guard = self.lock.write().expect("ConfigStore lock poisoned");
        trace!(path = %self.path.display(), read_only, "Writing storage config");

        if let Some(parent) = self.path.parent() {
            create_config_dir(parent, self.owner)?;
        }

        let mut doc = match self.load() {
            Ok(Some(doc)) => doc,
            Ok(None) => ConfigDocument::new(),
            Err(Error::Serialization { source, .. }) => {
                warn!(path = %self.path.display(), error = %source, "Existing config is not valid JSON, starting from an empty document");
                ConfigDocument::new()
            }
            Err(e) => return Err(e),
        };
        doc.apply(ids, &timestamp_now());

        let content = doc.to_pretty_json().map_err(|source| Error::Serialization {
            path: self.path.clone(),
            source,
        })?;

        self.persist(&content, read_only)?;
        debug!(path = %self.path.display(), keys = doc.len(), "Storage config written");
        Ok(doc)
    }

    fn load(&self) -> Result<Option<ConfigDocument>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "Config file does not exist");
                return Ok(None);
            }
            Err(e) => return Err(Error::io("failed to read config file", &self.path, e)),
        };

        let doc = serde_json::from_str(&content).map_err(|source| Error::Serialization {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(doc))
    }

    /// Writes `content` next to the destination and renames it into place.
    /// The temporary file never outlives a failure.
    fn persist(&self, content: &[u8], read_only: bool) -> Result<()> {
        let tmp_path = temp_path(&self.path);
        if let Err(e) = self.replace_with(&tmp_path, content, read_only) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        sync_parent_dir(&self.path);
        Ok(())
    }

    fn replace_with(&self, tmp_path: &Path, content: &[u8], read_only: bool) -> Result<()> {
        let _ = fs::remove_file(tmp_path);

        let mut file = File::create(tmp_path)
            .map_err(|e| Error::io("failed to write temporary file", tmp_path, e))?;
        file.write_all(content)
            .and_then(|_| file.sync_all())
            .map_err(|e| Error::io("failed to write temporary file", tmp_path, e))?;
        drop(file);

        set_final_permissions(tmp_path, read_only)
            .map_err(|e| Error::io("failed to set temporary file permissions", tmp_path, e))?;

        #[cfg(unix)]
        {
            let owner = existing_owner(&self.path).or(self.owner);
            if let Some(owner) = owner {
                set_owner(tmp_path, owner)
                    .map_err(|e| Error::io("failed to set temporary file owner", tmp_path, e))?;
            }
        }

        #[cfg(windows)]
        {
            clear_read_only(&self.path)
                .map_err(|e| Error::io("failed to unlock existing config file", &self.path, e))?;
        }

        fs::rename(tmp_path, &self.path)
            .map_err(|e| Error::io("failed to rename file", &self.path, e))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

fn create_config_dir(dir: &Path, owner: Option<FileOwner>) -> Result<()> {
    let missing: Vec<PathBuf> = dir
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .take_while(|p| !p.exists())
        .map(Path::to_path_buf)
        .collect();

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder
        .create(dir)
        .map_err(|e| Error::io("failed to create config directory", dir, e))?;

    #[cfg(unix)]
    {
        if let Some(owner) = owner {
            for created in &missing {
                set_owner(created, owner)
                    .map_err(|e| Error::io("failed to set config directory owner", created, e))?;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = (owner, missing);
    }
    Ok(())
}

#[cfg(unix)]
fn existing_owner(path: &Path) -> Option<FileOwner> {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).ok().map(|meta| FileOwner {
        uid: meta.uid(),
        gid: meta.gid(),
    })
}

// No-op when the owner already matches; unprivileged runs cannot chown.
#[cfg(unix)]
fn set_owner(path: &Path, owner: FileOwner) -> std::io::Result<()> {
    if existing_owner(path) == Some(owner) {
        return Ok(());
    }
    std::os::unix::fs::chown(path, Some(owner.uid), Some(owner.gid))
}

#[cfg(unix)]
fn set_final_permissions(path: &Path, read_only: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if read_only { READ_ONLY_MODE } else { FILE_MODE };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_final_permissions(path: &Path, read_only: bool) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(read_only);
    fs::set_permissions(path, perms)
}

// Windows refuses to rename over a read-only destination.
#[cfg(windows)]
fn clear_read_only(path: &Path) -> std::io::Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.permissions().readonly() => {
            let mut perms = meta.permissions();
            perms.set_readonly(false);
            fs::set_permissions(path, perms)
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn sync_parent_dir(path: &Path) {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
                debug!(dir = %parent.display(), error = %e, "Directory sync failed");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
