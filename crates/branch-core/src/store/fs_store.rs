//! Filesystem-backed item store
//!
//! Layout mirrors the item tree, one directory per encoded name:
//!
//! ```text
//! <root>/<org>/item.toml
//! <root>/<org>/items/<repo>/item.toml
//! <root>/<org>/items/<repo>/items/<branch>/item.toml
//! <root>/<standalone-repo>/item.toml
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use uuid::Uuid;

use super::{ItemRecord, ItemStore};
use crate::model::ItemPath;
use crate::{Error, Result};

const RECORD_FILE: &str = "item.toml";
const CHILDREN_DIR: &str = "items";

#[derive(Debug, Clone)]
pub struct FsItemStore {
    root: PathBuf,
}

impl FsItemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding an item's record.
    pub fn item_dir(&self, path: &ItemPath) -> PathBuf {
        let mut dir = self.root.clone();
        for (depth, segment) in path.segments().iter().enumerate() {
            if depth > 0 {
                dir.push(CHILDREN_DIR);
            }
            dir.push(segment);
        }
        dir
    }

    fn children_dir(&self, parent: Option<&ItemPath>) -> PathBuf {
        match parent {
            Some(path) => self.item_dir(path).join(CHILDREN_DIR),
            None => self.root.clone(),
        }
    }

    fn read_record(path: &Path) -> Result<ItemRecord> {
        let file = File::open(path)?;
        file.lock_shared()?;

        let mut content = String::new();
        (&file).read_to_string(&mut content)?;
        Ok(toml::from_str(&content)?)
    }
}

impl ItemStore for FsItemStore {
    fn save(&self, record: &ItemRecord) -> Result<()> {
        let dir = self.item_dir(&record.path);
        fs::create_dir_all(&dir).map_err(|e| Error::store(&dir, e.to_string()))?;

        let content = toml::to_string_pretty(record)?;
        write_atomic(&dir.join(RECORD_FILE), content.as_bytes())?;

        tracing::debug!(item = %record.path, "Saved item record");
        Ok(())
    }

    fn remove(&self, path: &ItemPath) -> Result<()> {
        let dir = self.item_dir(path);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::debug!(item = %path, "Removed item record");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::store(&dir, e.to_string())),
        }
    }

    fn load_children(&self, parent: Option<&ItemPath>) -> Result<Vec<ItemRecord>> {
        let dir = self.children_dir(parent);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::store(&dir, e.to_string())),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let file = entry.path().join(RECORD_FILE);
            if !file.exists() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            match Self::read_record(&file) {
                Ok(record) if record.name() == dir_name => records.push(record),
                Ok(record) => {
                    tracing::warn!(
                        file = %file.display(),
                        recorded = %record.path,
                        "Item record does not match its directory, skipping"
                    );
                }
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "Unreadable item record, skipping");
                }
            }
        }

        records.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(records)
    }
}

/// Write content with the write-to-temp-then-rename pattern under an
/// exclusive lock.
///
/// Every write gets its own temp file, so concurrent saves of one record
/// each land whole and the last rename wins.
fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        Uuid::new_v4().simple()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::store(&temp_path, e.to_string()))?;

    temp_file
        .lock_exclusive()
        .map_err(|e| Error::store(path, format!("lock failed: {}", e)))?;
    temp_file
        .write_all(content)
        .map_err(|e| Error::store(&temp_path, e.to_string()))?;
    temp_file
        .sync_all()
        .map_err(|e| Error::store(&temp_path, e.to_string()))?;
    temp_file
        .unlock()
        .map_err(|e| Error::store(path, format!("unlock failed: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| Error::store(path, e.to_string()))?;
    Ok(())
}
