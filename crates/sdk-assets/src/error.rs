use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Unsupported module format: {0}")]
    UnsupportedFormat(String),

    #[error("{tool} exited with code {code}:\n{transcript}")]
    ToolFailed {
        tool: String,
        code: i32,
        transcript: String,
    },

    #[error("Expected generated file is missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error(
        "Installed file not found after move: {} -> {}",
        .source_path.display(),
        .destination.display()
    )]
    InstallVerification {
        source_path: PathBuf,
        destination: PathBuf,
    },

    #[error("Invalid layout file: {0}")]
    InvalidLayout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssetError>;
