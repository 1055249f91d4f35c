//! Error types for chunkwave.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkwaveError {
    // Submission errors
    #[error("Empty audio input: no samples to process")]
    EmptyInput,

    #[error("Invalid chunk count: must be a positive integer")]
    InvalidChunkCount,

    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    // Processing errors
    #[error("Transform failed: {message}")]
    Transform { message: String },

    #[error("Audio decoding failed: {message}")]
    AudioDecode { message: String },

    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ChunkwaveError>;
