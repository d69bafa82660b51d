//! Errors raised by the incremental update

#[derive(Debug, thiserror::Error)]
pub enum IncrementalError {
    #[error("nothing to do: no change paths and no metadata overrides given")]
    NothingToDo,

    #[error("no snapshot found matching the filter")]
    NoSnapshotFound,

    #[error("ambiguous snapshot id prefix {0:?}")]
    AmbiguousPrefix(String),
}
