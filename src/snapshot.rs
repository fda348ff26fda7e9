//! The Snapshot Codec: serializes the Store Root to
//! a UTF-8 JSON document through the file-system seam and reloads it later,
//! decoupling the store from the concrete file system.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, S7ClientError};
use crate::fs::FileSystem;
use crate::types::StoreRoot;

pub struct SnapshotCodec;

impl SnapshotCodec {
    pub async fn save_structure(fs: &dyn FileSystem, path: &str, root: &StoreRoot) -> Result<()> {
        let json = serde_json::to_vec_pretty(root).map_err(|e| serialization_error(path, e))?;
        let mut writer = fs.create(path).await.map_err(|e| serialization_error(path, e))?;
        writer.write_all(&json).await.map_err(|e| serialization_error(path, e))?;
        writer.flush().await.map_err(|e| serialization_error(path, e))?;
        Ok(())
    }

    pub async fn load_structure(fs: &dyn FileSystem, path: &str) -> Result<StoreRoot> {
        if !fs.exists(path).await {
            return Err(S7ClientError::SerializationError {
                path: path.to_string(),
                detail: "file does not exist".to_string(),
            });
        }
        let mut reader = fs.open_read(path).await.map_err(|e| serialization_error(path, e))?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.map_err(|e| serialization_error(path, e))?;
        serde_json::from_slice(&buf).map_err(|e| serialization_error(path, e))
    }
}

fn serialization_error(path: &str, err: impl std::fmt::Display) -> S7ClientError {
    S7ClientError::SerializationError { path: path.to_string(), detail: err.to_string() }
}
