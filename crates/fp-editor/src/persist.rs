//! Persistence backends.
//!
//! - [`FolderStore`]: timestamped files in a user-chosen directory. The
//!   directory is asked for once and reused until it stops being writable.
//! - [`VersionStore`]: the last ten saved versions, optionally mirrored to a
//!   MessagePack file.
//! - [`RecoveryFile`] and [`MemoryStorage`]: single-slot sinks for the
//!   autosave path.
//!
//! None of these touch the live graph; a failure is reported and the
//! caller's state stays as it was.

use crate::autosave::DocumentSink;
use crate::error::PersistError;
use chrono::{DateTime, Local, TimeZone};
use fp_core::codec::{DocumentMeta, FlowDocument, Imported, decode_document, encode_document};
use fp_core::store::GraphState;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

/// Key the recovery copy is stored under.
pub const RECOVERY_KEY: &str = "saved-flow-data";

/// Versions kept by [`VersionStore`] before the oldest is evicted.
pub const MAX_VERSIONS: usize = 10;

// ─── Backend selection ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    /// Write files into a chosen directory.
    Folder,
    /// Fall back to the capped version store.
    Versions,
}

/// Prefer directory writes when the host offers them.
pub fn select_save_target(folder_supported: bool) -> SaveTarget {
    if folder_supported {
        SaveTarget::Folder
    } else {
        SaveTarget::Versions
    }
}

/// Write `bytes` to `path` through a sibling temp file so readers never see
/// a half-written document.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Outcome of an explicit save, whichever backend handled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    /// Human-readable location ("folder/flow-....json", a version name).
    pub location: String,
    /// Documents now held by the backend.
    pub count: usize,
}

/// Somewhere an explicit "save" can put a whole document.
pub trait SaveBackend {
    fn save_document(&mut self, doc: FlowDocument) -> Result<SaveReceipt, PersistError>;
}

// ─── Folder store ────────────────────────────────────────────────────────

/// Asks the user for a directory. `None` means they cancelled.
pub trait DirectoryPicker {
    fn pick(&mut self) -> Option<PathBuf>;
}

impl<F: FnMut() -> Option<PathBuf>> DirectoryPicker for F {
    fn pick(&mut self) -> Option<PathBuf> {
        self()
    }
}

/// `flow-YYYY-MM-DD_HH-MM-SS.json`
pub fn flow_filename<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("flow-{}.json", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Default name for a manual export: `flow-YYYY-MM-DD.json`.
pub fn export_filename<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("flow-{}.json", at.format("%Y-%m-%d"))
}

/// Saved flow files in `dir`, sorted by name (and so by time).
pub fn flow_files(dir: &Path) -> Result<Vec<String>, PersistError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("flow-") && name.ends_with(".json") {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FolderSaveResult {
    pub filename: String,
    pub folder_name: String,
    pub path: PathBuf,
    pub timestamp: DateTime<Local>,
    /// Flow files in the folder after the write.
    pub file_count: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct FolderStore<P> {
    picker: P,
    directory: Option<PathBuf>,
}

impl<P: DirectoryPicker> FolderStore<P> {
    pub fn new(picker: P) -> Self {
        Self {
            picker,
            directory: None,
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn forget_directory(&mut self) {
        self.directory = None;
    }

    fn is_usable(dir: &Path) -> bool {
        fs::metadata(dir)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false)
    }

    /// The remembered directory if still usable, otherwise whatever the
    /// picker returns now.
    fn resolve_directory(&mut self) -> Result<PathBuf, PersistError> {
        if let Some(dir) = &self.directory {
            if Self::is_usable(dir) {
                return Ok(dir.clone());
            }
            log::warn!("folder store: {} is no longer usable, asking again", dir.display());
            self.directory = None;
        }
        let dir = self.picker.pick().ok_or(PersistError::NoDirectorySelected)?;
        if !Self::is_usable(&dir) {
            return Err(PersistError::DirectoryUnavailable(dir));
        }
        self.directory = Some(dir.clone());
        Ok(dir)
    }

    pub fn save(&mut self, doc: &FlowDocument) -> Result<FolderSaveResult, PersistError> {
        let dir = self.resolve_directory()?;
        let timestamp = Local::now();
        let filename = flow_filename(&timestamp);
        let path = dir.join(&filename);
        write_atomic(&path, encode_document(doc)?.as_bytes())?;

        let folder_name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        let file_count = flow_files(&dir)?.len();
        log::info!("saved {}", path.display());
        Ok(FolderSaveResult {
            message: format!("Saved to {folder_name}/{filename}"),
            filename,
            folder_name,
            path,
            timestamp,
            file_count,
        })
    }
}

impl<P: DirectoryPicker> SaveBackend for FolderStore<P> {
    fn save_document(&mut self, doc: FlowDocument) -> Result<SaveReceipt, PersistError> {
        let saved = self.save(&doc)?;
        Ok(SaveReceipt {
            location: format!("{}/{}", saved.folder_name, saved.filename),
            count: saved.file_count,
        })
    }
}

// ─── Version store ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowVersion {
    pub id: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub name: String,
    pub data: FlowDocument,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveResult {
    pub id: u64,
    pub timestamp: i64,
    pub name: String,
    pub current_count: usize,
    pub max_versions: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VersionFile {
    next_id: u64,
    versions: VecDeque<FlowVersion>,
}

/// Append-only store of recent versions, oldest first internally.
#[derive(Debug)]
pub struct VersionStore {
    file: VersionFile,
    path: Option<PathBuf>,
    max_versions: usize,
}

impl VersionStore {
    pub fn in_memory() -> Self {
        Self {
            file: VersionFile {
                next_id: 1,
                versions: VecDeque::new(),
            },
            path: None,
            max_versions: MAX_VERSIONS,
        }
    }

    /// Load from `path`, starting empty if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let path = path.into();
        let mut store = Self::in_memory();
        if path.exists() {
            let bytes = fs::read(&path)?;
            store.file = rmp_serde::from_slice(&bytes)?;
            store.file.next_id = store.file.next_id.max(1);
            log::debug!(
                "version store: loaded {} version(s) from {}",
                store.file.versions.len(),
                path.display()
            );
        }
        store.path = Some(path);
        Ok(store)
    }

    pub fn with_max_versions(mut self, max: usize) -> Self {
        self.max_versions = max.max(1);
        self
    }

    /// Write `next` and adopt it. On failure the store keeps its current
    /// contents, matching what is on disk.
    fn commit(&mut self, next: VersionFile) -> Result<(), PersistError> {
        if let Some(path) = &self.path {
            let bytes = rmp_serde::to_vec_named(&next)?;
            write_atomic(path, &bytes)?;
        }
        self.file = next;
        Ok(())
    }

    /// Store `data` as a new version, evicting the oldest past the cap.
    pub fn save(
        &mut self,
        data: FlowDocument,
        name: Option<&str>,
    ) -> Result<SaveResult, PersistError> {
        let now = Local::now();
        let timestamp = now.timestamp_millis();
        let name = match name {
            Some(n) if !n.trim().is_empty() => n.to_string(),
            _ => format!("Version {}", now.format("%Y-%m-%d %H:%M:%S")),
        };
        let mut next = self.file.clone();
        let id = next.next_id;
        next.next_id += 1;
        next.versions.push_back(FlowVersion {
            id,
            timestamp,
            name: name.clone(),
            data,
        });
        let mut evicted = Vec::new();
        while next.versions.len() > self.max_versions {
            evicted.extend(next.versions.pop_front());
        }
        self.commit(next)?;
        for old in evicted {
            log::debug!("version store: evicted version {} ({})", old.id, old.name);
        }
        log::info!("saved version {id} ({name})");
        Ok(SaveResult {
            id,
            timestamp,
            name,
            current_count: self.file.versions.len(),
            max_versions: self.max_versions,
        })
    }

    /// All versions, newest first.
    pub fn list(&self) -> Vec<&FlowVersion> {
        self.file.versions.iter().rev().collect()
    }

    pub fn get(&self, id: u64) -> Option<&FlowVersion> {
        self.file.versions.iter().find(|v| v.id == id)
    }

    pub fn delete(&mut self, id: u64) -> Result<(), PersistError> {
        let idx = self
            .file
            .versions
            .iter()
            .position(|v| v.id == id)
            .ok_or(PersistError::VersionNotFound(id))?;
        let mut next = self.file.clone();
        next.versions.remove(idx);
        self.commit(next)
    }

    pub fn count(&self) -> usize {
        self.file.versions.len()
    }

    pub fn max_versions(&self) -> usize {
        self.max_versions
    }
}

impl SaveBackend for VersionStore {
    fn save_document(&mut self, doc: FlowDocument) -> Result<SaveReceipt, PersistError> {
        let saved = self.save(doc, None)?;
        Ok(SaveReceipt {
            location: saved.name,
            count: saved.current_count,
        })
    }
}

// ─── Recovery sinks ──────────────────────────────────────────────────────

/// Single recovery document on disk, replaced whole on every write.
#[derive(Debug, Clone)]
pub struct RecoveryFile {
    path: PathBuf,
}

impl RecoveryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSink for RecoveryFile {
    fn write(&mut self, json: &str) -> Result<(), PersistError> {
        write_atomic(&self.path, json.as_bytes())
    }

    fn read(&self) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Key/value storage in memory, standing in for browser local storage.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    key: String,
    entries: HashMap<String, String>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(RECOVERY_KEY)
    }
}

impl MemoryStorage {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }
}

impl DocumentSink for MemoryStorage {
    fn write(&mut self, json: &str) -> Result<(), PersistError> {
        self.entries.insert(self.key.clone(), json.to_string());
        Ok(())
    }

    fn read(&self) -> Result<Option<String>, PersistError> {
        Ok(self.get(&self.key).map(str::to_string))
    }
}

// ─── Manual export/import ────────────────────────────────────────────────

pub fn export_to_file(
    path: &Path,
    state: &GraphState,
    meta: &DocumentMeta,
) -> Result<(), PersistError> {
    let doc = FlowDocument::from_state(state, meta);
    write_atomic(path, encode_document(&doc)?.as_bytes())?;
    log::info!("exported {} node(s) to {}", state.nodes().len(), path.display());
    Ok(())
}

/// Read and validate a document file. Nothing is applied to any live graph.
pub fn import_from_file(path: &Path) -> Result<Imported, PersistError> {
    let json = fs::read_to_string(path)?;
    let imported = decode_document(&json)?.into_graph();
    if !imported.dropped_connectors.is_empty() {
        log::warn!(
            "import: dropped {} connector(s) with missing endpoints",
            imported.dropped_connectors.len()
        );
    }
    log::info!("imported {} node(s) from {}", imported.state.nodes().len(), path.display());
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn filenames_follow_timestamp_pattern() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(flow_filename(&at), "flow-2024-03-09_07-05-02.json");
        assert_eq!(export_filename(&at), "flow-2024-03-09.json");
    }

    #[test]
    fn target_prefers_folder() {
        assert_eq!(select_save_target(true), SaveTarget::Folder);
        assert_eq!(select_save_target(false), SaveTarget::Versions);
    }

    #[test]
    fn memory_storage_uses_recovery_key() {
        let mut storage = MemoryStorage::default();
        storage.write("{}").unwrap();
        assert_eq!(storage.get(RECOVERY_KEY), Some("{}"));
        assert_eq!(storage.read().unwrap().as_deref(), Some("{}"));
    }

    #[test]
    fn missing_version_is_an_error() {
        let mut store = VersionStore::in_memory();
        assert!(matches!(store.delete(7), Err(PersistError::VersionNotFound(7))));
    }
}
