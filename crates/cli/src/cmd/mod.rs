//! CLI command implementations

pub mod backup;
pub mod forget;
pub mod incremental;
pub mod init;
pub mod ls;
pub mod snapshots;
