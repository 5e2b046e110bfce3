#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no image directories configured or found on disk")]
    NoDirectories,
    #[error("no supported images found among the scanned directories")]
    NoImagesFound,
    #[error("every candidate source image failed to transcode")]
    AllSourcesFailed,
    #[error("failed to decode image at {path}: {reason}")]
    Decode {
        path: std::path::PathBuf,
        reason: String,
    },
    #[error("failed to encode card artifact: {0}")]
    Encode(String),
    #[error("unknown card id: {0}")]
    UnknownCardId(String),
}

impl PipelineError {
    pub fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
