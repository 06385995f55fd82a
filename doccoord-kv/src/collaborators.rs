//! External collaborators the persistence and sync layers call through to,
//! but never implement against real infrastructure (spec §1 Non-goals: "the
//! document-format codec... the object-store client"). Kept as narrow
//! async traits so the server binary can wire in real implementations.

use async_trait::async_trait;

use crate::error::CResult;
use crate::ids::DocumentId;

/// Loads/serializes the binary office document (e.g. an SFDT codec).
///
/// Both collaborator traits use `#[async_trait]` rather than native
/// `async fn` in trait: the engine and server hold these behind `Arc<dyn
/// ..>` (one codec/store shared across every request), and native async
/// trait methods are not yet object-safe.
#[async_trait]
pub trait DocumentCodec: Send + Sync {
    /// Deserialize the binary document into the editor's exchange format.
    async fn deserialize(&self, document: DocumentId, bytes: &[u8]) -> CResult<serde_json::Value>;

    /// Serialize the editor's exchange format back to the binary document.
    async fn serialize(&self, document: DocumentId, sfdt: &serde_json::Value) -> CResult<Vec<u8>>;
}

/// Reads/writes the binary file to the backing object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download(&self, document: DocumentId) -> CResult<Vec<u8>>;

    async fn upload(&self, document: DocumentId, bytes: Vec<u8>) -> CResult<()>;
}
