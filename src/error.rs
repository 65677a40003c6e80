use thiserror::Error;

/// Fatal conditions that abort a whole import call.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to open scene source {path}: {message}")]
    Open { path: String, message: String },

    #[error("scene source is malformed: {0}")]
    Malformed(String),

    #[error("resource store failure: {0}")]
    Store(#[from] StoreError),

    #[error("scene object failure: {0}")]
    Scene(#[from] SceneError),
}

/// Errors raised by the runtime scene-object system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("unknown component type: {0}")]
    UnknownComponent(String),

    #[error("actor {0} does not exist")]
    MissingActor(usize),
}

/// Errors raised by resource store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}
