//! Minimal streamed file-system abstraction, so the
//! Snapshot Codec never touches `std::fs` directly and tests can swap in an
//! in-memory filesystem.

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn exists(&self, path: &str) -> bool;

    async fn create(&self, path: &str) -> io::Result<Box<dyn AsyncWrite + Send + Unpin>>;

    async fn open_read(&self, path: &str) -> io::Result<Box<dyn AsyncRead + Send + Unpin>>;
}

/// The default filesystem, backed by `tokio::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioFileSystem;

#[async_trait]
impl FileSystem for TokioFileSystem {
    async fn exists(&self, path: &str) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn create(&self, path: &str) -> io::Result<Box<dyn AsyncWrite + Send + Unpin>> {
        let file = tokio::fs::File::create(path).await?;
        Ok(Box::new(file))
    }

    async fn open_read(&self, path: &str) -> io::Result<Box<dyn AsyncRead + Send + Unpin>> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Box::new(file))
    }
}
