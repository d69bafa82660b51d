//! Strata core: content-addressed storage for backup trees
//!
//! This crate provides:
//! - BLAKE3 object identifiers
//! - The node and tree model with its canonical and JSON encodings
//! - A repository of compressed objects with an index for deduplication
//! - A bounded background uploader with flush and cancellation

pub mod backend;
pub mod config;
pub mod error;
pub mod hash;
pub mod node;
pub mod store;
pub mod tree;
pub mod upload;

pub use backend::{Backend, LocalBackend, ObjectKind};
pub use config::RepoConfig;
pub use error::{StoreError, TreeError};
pub use hash::{hash_bytes, ObjectId};
pub use node::{Node, NodeKind};
pub use store::Repository;
pub use tree::{Tree, TreeJsonBuilder};
pub use upload::{CancelToken, Uploader};

pub type Result<T> = anyhow::Result<T>;
