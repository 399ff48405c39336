//! Blob store for images.
//!
//! Objects live under `{root}/objects` and are addressed by relative path;
//! the content type declared at upload time is kept at the same relative
//! path under `{root}/meta`. Uploads are written to a uniquely named file in
//! `{root}/staging` and renamed into place.
//! Public URLs follow `{base}/storage/v1/object/public/{bucket}/{path}`.

use std::path::{Component, Path, PathBuf};

use base64::Engine;

use crate::errors::AppError;

/// Path prefix of public object URLs, before the bucket name.
pub const PUBLIC_PREFIX: &str = "/storage/v1/object/public/";

/// Content type of objects uploaded as raw bytes.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Content handed to [`BlobStore::upload`].
#[derive(Debug, Clone)]
pub enum BlobPayload {
    /// `data:<mime>;base64,<payload>`
    DataUrl(String),
    Bytes(Vec<u8>),
}

/// A decoded data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Decode a base64 data URL.
pub fn decode_data_url(data_url: &str) -> Result<DecodedBlob, AppError> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| AppError::Storage("Invalid data URL: missing payload".to_string()))?;

    let meta = header
        .strip_prefix("data:")
        .ok_or_else(|| AppError::Storage("Invalid data URL: missing 'data:' scheme".to_string()))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| AppError::Storage("Invalid data URL: payload is not base64".to_string()))?;

    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;

    Ok(DecodedBlob {
        content_type: content_type.to_string(),
        bytes,
    })
}

/// Filesystem-backed blob bucket.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
    public_base: String,
    bucket: String,
}

impl BlobStore {
    /// Open (and create if needed) the bucket directory.
    pub async fn open(
        root: impl Into<PathBuf>,
        public_base: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Result<Self, AppError> {
        let root = root.into();
        for dir in ["objects", "meta", "staging"] {
            tokio::fs::create_dir_all(root.join(dir)).await?;
        }
        Ok(Self {
            root,
            public_base: public_base.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Upload `payload` at `path`, overwriting any existing object, and
    /// return its public URL.
    pub async fn upload(&self, path: &str, payload: BlobPayload) -> Result<String, AppError> {
        let target = self.resolve("objects", path)?;
        let meta = self.resolve("meta", path)?;
        let blob = match payload {
            BlobPayload::DataUrl(data_url) => decode_data_url(&data_url)?,
            BlobPayload::Bytes(bytes) => DecodedBlob {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                bytes,
            },
        };

        self.write_atomic(&meta, blob.content_type.as_bytes()).await?;
        self.write_atomic(&target, &blob.bytes).await?;

        tracing::info!(
            path,
            size = blob.bytes.len(),
            content_type = %blob.content_type,
            "Uploaded blob"
        );
        Ok(self.public_url(path))
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}{}{}/{}", self.public_base, PUBLIC_PREFIX, self.bucket, path)
    }

    /// Delete the object at `path`.
    ///
    /// Failures are logged and reported as `false`, never raised.
    pub async fn delete(&self, path: &str) -> bool {
        let target = match self.resolve("objects", path) {
            Ok(target) => target,
            Err(e) => {
                tracing::error!(path, "Error deleting blob: {}", e);
                return false;
            }
        };

        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                if let Ok(meta) = self.resolve("meta", path) {
                    if let Err(e) = tokio::fs::remove_file(&meta).await {
                        tracing::warn!(path, "Error deleting blob content type: {}", e);
                    }
                }
                tracing::info!(path, "Deleted blob");
                true
            }
            Err(e) => {
                tracing::error!(path, "Error deleting blob: {}", e);
                false
            }
        }
    }

    /// Read the object at `path`, if present.
    pub async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, AppError> {
        let target = self.resolve("objects", path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Content type declared when the object at `path` was uploaded.
    pub async fn content_type(&self, path: &str) -> Result<String, AppError> {
        let meta = self.resolve("meta", path)?;
        match tokio::fs::read_to_string(&meta).await {
            Ok(content_type) if !content_type.trim().is_empty() => Ok(content_type.trim().to_string()),
            Ok(_) => Ok(DEFAULT_CONTENT_TYPE.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DEFAULT_CONTENT_TYPE.to_string()),
            Err(e) => Err(e.into()),
        }
    }

    /// Derive the bucket-relative path from a public URL.
    ///
    /// Returns `None` when the URL does not carry this bucket's public prefix.
    pub fn path_from_public_url(&self, url: &str) -> Option<String> {
        let after_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        let pathname = after_scheme.find('/').map(|idx| &after_scheme[idx..])?;
        let pathname = pathname.split(['?', '#']).next().unwrap_or_default();

        let prefix = format!("{}{}/", PUBLIC_PREFIX, self.bucket);
        let Some(start) = pathname.find(&prefix) else {
            tracing::warn!(url, "URL does not belong to the blob bucket");
            return None;
        };

        let path = &pathname[start + prefix.len()..];
        (!path.is_empty()).then(|| path.to_string())
    }

    /// Write `bytes` to a fresh staging file, then rename it onto `target`.
    async fn write_atomic(&self, target: &Path, bytes: &[u8]) -> Result<(), AppError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self
            .root
            .join("staging")
            .join(uuid::Uuid::new_v4().simple().to_string());
        tokio::fs::write(&staging, bytes).await?;
        if let Err(e) = tokio::fs::rename(&staging, target).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Map a bucket-relative path into `area`, rejecting escapes.
    fn resolve(&self, area: &str, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(path);
        let clean = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !clean {
            return Err(AppError::Storage(format!("Invalid blob path: '{}'", path)));
        }
        Ok(self.root.join(area).join(relative))
    }
}
