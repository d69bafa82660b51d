//! Object storage backends
//!
//! A backend persists sealed (already compressed) objects by kind and id. It
//! knows nothing about trees or snapshots; the repository layers that on top.

use crate::hash::ObjectId;
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Class of stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// Canonical tree encoding
    Tree,
    /// JSON rendering of a tree
    TreeJson,
    /// File content
    Data,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 3] = [ObjectKind::Tree, ObjectKind::TreeJson, ObjectKind::Data];

    /// Directory name under `objects/`
    pub fn dir_name(&self) -> &'static str {
        match self {
            ObjectKind::Tree => "tree",
            ObjectKind::TreeJson => "tree-json",
            ObjectKind::Data => "data",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Storage for sealed objects
///
/// Implementations must be safe to call from several upload workers at once.
/// `put` of an object that already exists is a no-op.
pub trait Backend: Send + Sync {
    /// Store a sealed object
    fn put(&self, kind: ObjectKind, id: &ObjectId, sealed: &[u8]) -> Result<()>;

    /// Fetch a sealed object, `None` if it is not stored
    fn get(&self, kind: ObjectKind, id: &ObjectId) -> Result<Option<Vec<u8>>>;

    /// List every stored object of a kind
    fn list(&self, kind: ObjectKind) -> Result<Vec<ObjectId>>;
}

/// Backend writing objects below a local directory
///
/// Layout: `objects/<kind>/<hh>/<rest>` with two hex characters of fan-out.
pub struct LocalBackend {
    objects_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(objects_dir: PathBuf, tmp_dir: PathBuf) -> Self {
        Self {
            objects_dir,
            tmp_dir,
        }
    }

    /// Create the per-kind directories
    pub fn create_layout(&self) -> Result<()> {
        for kind in ObjectKind::ALL {
            fs::create_dir_all(self.objects_dir.join(kind.dir_name()))?;
        }
        fs::create_dir_all(&self.tmp_dir)?;
        Ok(())
    }

    fn object_path(&self, kind: ObjectKind, id: &ObjectId) -> PathBuf {
        // objects/<kind>/<hh>/<rest>
        let hex = id.to_hex();
        let (prefix, suffix) = hex.split_at(2);
        self.objects_dir
            .join(kind.dir_name())
            .join(prefix)
            .join(suffix)
    }
}

impl Backend for LocalBackend {
    fn put(&self, kind: ObjectKind, id: &ObjectId, sealed: &[u8]) -> Result<()> {
        let path = self.object_path(kind, id);
        if path.exists() {
            return Ok(());
        }

        atomic_write(&self.tmp_dir, &path, sealed)
            .with_context(|| format!("Failed to write {} object {}", kind, id.short()))
    }

    fn get(&self, kind: ObjectKind, id: &ObjectId) -> Result<Option<Vec<u8>>> {
        match fs::read(self.object_path(kind, id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read {} object {}", kind, id.short())),
        }
    }

    fn list(&self, kind: ObjectKind) -> Result<Vec<ObjectId>> {
        let kind_dir = self.objects_dir.join(kind.dir_name());
        let mut ids = Vec::new();

        let fanout = match fs::read_dir(&kind_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };

        for prefix_entry in fanout {
            let prefix_entry = prefix_entry?;
            if !prefix_entry.file_type()?.is_dir() {
                continue;
            }
            let prefix = prefix_entry.file_name().to_string_lossy().into_owned();

            for object_entry in fs::read_dir(prefix_entry.path())? {
                let object_entry = object_entry?;
                let suffix = object_entry.file_name().to_string_lossy().into_owned();
                match ObjectId::from_hex(&format!("{}{}", prefix, suffix)) {
                    Ok(id) => ids.push(id),
                    Err(_) => {
                        tracing::warn!(
                            "Ignoring stray file in object store: {}",
                            object_entry.path().display()
                        );
                    }
                }
            }
        }

        Ok(ids)
    }
}

/// Atomic write helper
///
/// Writes data to a uniquely named temporary file, fsyncs it, then renames it
/// into place and fsyncs the parent directory.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    fs::create_dir_all(tmp_dir)?;

    let temp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());

    let mut temp_file = fs::File::create(&temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    drop(temp_file);

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if let Err(e) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    if let Some(parent) = target.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
