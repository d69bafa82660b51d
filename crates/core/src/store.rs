//! Repository: content-addressed storage for trees and file data

use crate::backend::{Backend, LocalBackend, ObjectKind};
use crate::config::RepoConfig;
use crate::error::StoreError;
use crate::hash::{hash_bytes, ObjectId};
use crate::tree::Tree;
use crate::upload::{CancelToken, ObjectIndex, UploadJob, Uploader};
use ahash::RandomState;
use anyhow::{Context, Result};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A backup repository
///
/// Manages the repository directory:
/// ```text
/// <repo>/
///   config.toml
///   locks/
///     repo.lock
///   objects/
///     tree/<hh>/<rest>
///     tree-json/<hh>/<rest>
///     data/<hh>/<rest>
///   snapshots/
///   tmp/
/// ```
///
/// Objects are zstd-compressed before they reach the backend. Saving an
/// object whose id is already indexed is a no-op.
pub struct Repository {
    root: PathBuf,
    config: RepoConfig,
    backend: Arc<dyn Backend>,
    index: Arc<ObjectIndex>,
    tree_cache: DashMap<ObjectId, Arc<Tree>, RandomState>,
    uploader: RwLock<Option<Uploader>>,
    cancel: CancelToken,
}

impl Repository {
    /// Initialize a new repository at `root`
    pub fn init(root: &Path) -> Result<Self> {
        Self::init_with_config(root, RepoConfig::default())
    }

    /// Initialize a new repository with explicit configuration
    pub fn init_with_config(root: &Path, config: RepoConfig) -> Result<Self> {
        let config_path = root.join("config.toml");
        if config_path.exists() {
            return Err(StoreError::AlreadyInitialized(root.display().to_string()).into());
        }

        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create {}", root.display()))?;
        fs::create_dir_all(root.join("locks"))?;
        fs::create_dir_all(root.join("snapshots"))?;

        let backend = LocalBackend::new(root.join("objects"), root.join("tmp"));
        backend.create_layout()?;

        config.save(&config_path)?;
        tracing::info!("Initialized repository at {}", root.display());

        Ok(Self::from_parts(root, config, Arc::new(backend)))
    }

    /// Open an existing repository
    pub fn open(root: &Path) -> Result<Self> {
        let config_path = root.join("config.toml");
        if !config_path.exists() {
            return Err(StoreError::NotInitialized(root.display().to_string()).into());
        }

        for dir in ["locks", "objects", "snapshots"] {
            if !root.join(dir).is_dir() {
                anyhow::bail!("Missing required directory: {}", dir);
            }
        }

        let config = RepoConfig::load(&config_path)?;
        let backend = LocalBackend::new(root.join("objects"), root.join("tmp"));

        Ok(Self::from_parts(root, config, Arc::new(backend)))
    }

    /// Assemble a repository over an arbitrary backend
    pub fn from_parts(root: &Path, config: RepoConfig, backend: Arc<dyn Backend>) -> Self {
        Self {
            root: root.to_path_buf(),
            config,
            backend,
            index: Arc::new(ObjectIndex::new()),
            tree_cache: DashMap::default(),
            uploader: RwLock::new(None),
            cancel: CancelToken::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Directory holding the snapshot journal
    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    /// Directory holding lock files
    pub fn locks_dir(&self) -> PathBuf {
        self.root.join("locks")
    }

    /// Load the object index from the backend
    ///
    /// Must run before saving so existing objects are deduplicated.
    pub fn load_index(&self) -> Result<usize> {
        let mut count = 0;
        for kind in ObjectKind::ALL {
            for id in self.backend.list(kind)? {
                self.index.insert_known((kind, id));
                count += 1;
            }
        }
        tracing::debug!("Loaded {} objects into the index", count);
        Ok(count)
    }

    /// Check whether an object is stored or queued for storage
    pub fn has(&self, kind: ObjectKind, id: &ObjectId) -> bool {
        self.index.contains(&(kind, *id))
    }

    /// Cancellation token shared with the upload workers
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Fail fast once the operation has been cancelled
    ///
    /// Reports the upload failure that caused the cancellation when there is
    /// one.
    pub fn check_cancelled(&self) -> Result<(), StoreError> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }
        let upload_error = self.uploader.read().as_ref().and_then(Uploader::error);
        Err(upload_error.unwrap_or(StoreError::Cancelled))
    }

    /// Start the background uploader; later saves are queued to it
    pub fn start_uploader(&self) {
        let mut slot = self.uploader.write();
        if slot.is_some() {
            return;
        }
        *slot = Some(Uploader::start(
            Arc::clone(&self.backend),
            Arc::clone(&self.index),
            self.cancel.clone(),
            self.config.upload.workers,
            self.config.upload.queue_depth,
        ));
    }

    /// Wait for every queued object to be stored
    ///
    /// Returns the first upload error. Without a running uploader all saves
    /// were synchronous and this is a no-op.
    pub fn flush(&self) -> Result<()> {
        if let Some(uploader) = self.uploader.read().as_ref() {
            uploader.flush()?;
        }
        Ok(())
    }

    /// Stop the background uploader after draining it
    pub fn stop_uploader(&self) -> Result<()> {
        if let Some(uploader) = self.uploader.write().take() {
            uploader.shutdown()?;
        }
        Ok(())
    }

    /// Save raw bytes as an object of `kind`
    pub fn save_blob(&self, kind: ObjectKind, data: &[u8]) -> Result<ObjectId> {
        let id = hash_bytes(data);
        if self.has(kind, &id) {
            return Ok(id);
        }
        self.check_cancelled()?;

        let sealed = zstd::encode_all(data, self.config.store.compression_level)
            .with_context(|| format!("Failed to compress {} object", kind))?;

        match self.uploader.read().as_ref() {
            Some(uploader) => {
                uploader.submit(UploadJob {
                    kind,
                    id,
                    plain: Arc::new(data.to_vec()),
                    sealed,
                })?;
            }
            None => {
                self.backend.put(kind, &id, &sealed)?;
                self.index.insert_known((kind, id));
            }
        }

        Ok(id)
    }

    /// Save a tree in its canonical encoding
    pub fn save_tree(&self, tree: &Tree) -> Result<ObjectId> {
        let bytes = tree.serialize()?;
        let id = self.save_blob(ObjectKind::Tree, &bytes)?;
        self.tree_cache
            .entry(id)
            .or_insert_with(|| Arc::new(tree.clone()));
        Ok(id)
    }

    /// Save the content of a regular file as a data object
    ///
    /// Large files are read through a memory map.
    pub fn save_file(&self, path: &Path) -> Result<ObjectId> {
        let file = fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let len = file.metadata()?.len();

        if len >= self.config.store.mmap_threshold {
            // SAFETY: the map is read-only and dropped before returning
            let mmap = unsafe { memmap2::Mmap::map(&file) }
                .with_context(|| format!("Failed to map {}", path.display()))?;
            self.save_blob(ObjectKind::Data, &mmap)
        } else {
            let mut data = Vec::with_capacity(len as usize);
            (&file).read_to_end(&mut data)?;
            self.save_blob(ObjectKind::Data, &data)
        }
    }

    /// Load an object's plain bytes, verifying its hash
    pub fn load_blob(&self, kind: ObjectKind, id: &ObjectId) -> Result<Vec<u8>> {
        if let Some(plain) = self.index.pending(&(kind, *id)) {
            return Ok(plain.as_ref().clone());
        }

        let sealed = self
            .backend
            .get(kind, id)?
            .ok_or(StoreError::ObjectNotFound { kind, id: *id })?;
        let plain = zstd::decode_all(sealed.as_slice())
            .with_context(|| format!("Failed to decompress {} object {}", kind, id.short()))?;

        let actual = hash_bytes(&plain);
        if actual != *id {
            return Err(StoreError::HashMismatch {
                kind,
                expected: *id,
                actual,
            }
            .into());
        }

        Ok(plain)
    }

    /// Load a tree by id
    pub fn load_tree(&self, id: &ObjectId) -> Result<Arc<Tree>> {
        if let Some(cached) = self.tree_cache.get(id) {
            return Ok(Arc::clone(cached.value()));
        }

        let bytes = self.load_blob(ObjectKind::Tree, id)?;
        let tree = Arc::new(
            Tree::deserialize(&bytes)
                .with_context(|| format!("Failed to decode tree {}", id.short()))?,
        );

        self.tree_cache.insert(*id, Arc::clone(&tree));
        Ok(tree)
    }
}

impl Drop for Repository {
    fn drop(&mut self) {
        if let Some(uploader) = self.uploader.get_mut().take() {
            if let Err(e) = uploader.shutdown() {
                tracing::warn!("Uploader stopped with error: {}", e);
            }
        }
    }
}
