//! Error taxonomy for the coordination engine (spec §7).
//!
//! `CResult` mirrors the narrow `Result<T, Error>` alias the rest of this
//! codebase's lineage already calls through to from its codec layer.

use thiserror::Error;

use crate::ids::DocumentId;

pub type CResult<T> = Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// `reserve`/`get-pending` saw a client version below the persisted tip.
    #[error("stale client: persisted version is {persisted_version}")]
    StaleClient { persisted_version: u64 },

    /// `commit` found a gap in `(P(D), v)` — a concurrent submitter hasn't
    /// landed yet. Retried internally by the pipeline; never surfaced raw.
    #[error("gap before version {version}")]
    GapBefore { version: u64 },

    /// `commit` found a `PENDING` slot in `(P(D), v)`.
    #[error("pending slot before version {version}")]
    PendingBefore { version: u64 },

    /// `commit` found the target slot was not `PENDING` (tampered with, or
    /// already committed by a retried caller).
    #[error("version conflict at {version}")]
    VersionConflict { version: u64 },

    /// CAS retries exhausted (spec §4.3, `MAX_RETRIES`).
    #[error("retries exhausted for document {document_id:?} after {attempts} attempts")]
    RetriesExhausted { document_id: DocumentId, attempts: u32 },

    /// Transport-level failure talking to the backing store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The external object-store collaborator failed to read/write the
    /// binary document.
    #[error("object store failure: {0}")]
    ObjectStoreFailure(String),

    /// The external OT transform function failed.
    #[error("ot transform failure: {0}")]
    OtTransformFailure(String),

    /// A JSON boundary failed to parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// Anything else internal that should not normally happen.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
