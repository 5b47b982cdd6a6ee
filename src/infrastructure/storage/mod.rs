use std::path::PathBuf;

use derive_more::Display;

pub mod compress;
pub mod paths;
pub mod provisioner;

pub use compress::{CompressionError, ImageCompressor, ImageCrateCompressor, SourcePattern};
pub use paths::{ImageExtension, ImageTarget, UploadPaths};
pub use provisioner::Provisioned;

#[derive(Debug, Display)]
pub enum StorageError {
    #[display("{} exists and is not a directory", _0.display())]
    NotADirectory(PathBuf),

    #[display("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io { source, .. } => Some(source),
            StorageError::NotADirectory(_) => None,
        }
    }
}
