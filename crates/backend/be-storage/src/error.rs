//! Failures of the bundle blob store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("unknown storage backend '{0}', expected fs, s3 or memory")]
    UnknownBackend(String),

    #[error("{0} must be set for the s3 storage backend")]
    MissingEnvVar(&'static str),

    #[error("cannot prepare blob root {root}: {source}")]
    Root {
        root: String,
        #[source]
        source: std::io::Error,
    },

    #[error("blob {operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: opendal::Error,
    },

    #[error("no blob stored at {0}")]
    BlobNotFound(String),
}

impl StorageError {
    pub fn root(root: impl Into<String>, source: std::io::Error) -> Self {
        Self::Root {
            root: root.into(),
            source,
        }
    }

    /// Wrap an OpenDAL error, turning its NotFound kind into [`StorageError::BlobNotFound`].
    pub fn backend(operation: &'static str, path: &str, source: opendal::Error) -> Self {
        if source.kind() == opendal::ErrorKind::NotFound {
            Self::BlobNotFound(path.to_string())
        } else {
            Self::Backend { operation, source }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BlobNotFound(_))
    }

    /// Errors that come from settings rather than from the store itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownBackend(_) | Self::MissingEnvVar(_) | Self::Root { .. }
        )
    }
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
