//! Reference implementations of the engine's external collaborator traits
//! (spec.md §1 Non-goals: "the document-format codec", "the object-store
//! client"). Real deployments swap these for an SFDT codec and an S3/GCS
//! client; this build wires in a filesystem-backed stand-in so the server
//! is runnable without external infrastructure.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use doccoord_kv::collaborators::{DocumentCodec, ObjectStore};
use doccoord_kv::error::{CResult, Error};
use doccoord_kv::ids::DocumentId;

/// Treats the exchange-format document as JSON passthrough: `deserialize`
/// parses the stored bytes as JSON (or starts from an empty document if
/// none exist yet), `serialize` writes it back out the same way. The real
/// SFDT binary codec is out of scope (spec.md §1).
pub struct PassthroughDocumentCodec;

#[async_trait]
impl DocumentCodec for PassthroughDocumentCodec {
    async fn deserialize(&self, _document: DocumentId, bytes: &[u8]) -> CResult<serde_json::Value> {
        if bytes.is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_slice(bytes).map_err(Error::from)
    }

    async fn serialize(&self, _document: DocumentId, sfdt: &serde_json::Value) -> CResult<Vec<u8>> {
        serde_json::to_vec(sfdt).map_err(Error::from)
    }
}

/// Stores one file per document under `root`, named by the document's UUID.
/// Stands in for the real object-store client (spec.md §1 Non-goals).
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsObjectStore { root: root.into() }
    }

    fn path_for(&self, document: DocumentId) -> PathBuf {
        self.root.join(format!("{document}.json"))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn download(&self, document: DocumentId) -> CResult<Vec<u8>> {
        let path = self.path_for(document);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(Error::ObjectStoreFailure(err.to_string())),
        }
    }

    async fn upload(&self, document: DocumentId, bytes: Vec<u8>) -> CResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|err| Error::ObjectStoreFailure(err.to_string()))?;
        let path = self.path_for(document);
        fs::write(&path, bytes).await.map_err(|err| Error::ObjectStoreFailure(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_download_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let document = DocumentId::new();

        assert_eq!(store.download(document).await.unwrap(), Vec::<u8>::new());

        store.upload(document, b"hello".to_vec()).await.unwrap();
        assert_eq!(store.download(document).await.unwrap(), b"hello".to_vec());
    }

    #[tokio::test]
    async fn passthrough_codec_round_trips_json() {
        let codec = PassthroughDocumentCodec;
        let document = DocumentId::new();
        let value = serde_json::json!({"text": "hi"});
        let bytes = codec.serialize(document, &value).await.unwrap();
        let parsed = codec.deserialize(document, &bytes).await.unwrap();
        assert_eq!(parsed, value);
    }

    #[tokio::test]
    async fn deserialize_on_empty_bytes_starts_from_an_empty_document() {
        let codec = PassthroughDocumentCodec;
        let document = DocumentId::new();
        let parsed = codec.deserialize(document, &[]).await.unwrap();
        assert_eq!(parsed, serde_json::json!({}));
    }
}
