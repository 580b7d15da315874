//! Typed error taxonomy for the listener core (spec §7).
//!
//! `ConfigError` and a transcription-engine init failure are fatal at
//! startup. `AudioDeviceError` inside the listen loop is fatal. A
//! `TranscriptionError` during a stage is logged and treated as an empty
//! transcription for that iteration. `RegistryLoadError` and
//! `HandlerError` are logged and never alter listener state.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required option: {0}")]
    MissingOption(&'static str),
    #[error("invalid value for {option}: {reason}")]
    InvalidValue { option: &'static str, reason: String },
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Error, Debug)]
pub enum AudioDeviceError {
    #[error("no capture device matched name {0:?}")]
    NoMatchingDevice(String),
    #[error("failed to build audio stream: {0}")]
    BuildStream(String),
    #[error("failed to start audio stream: {0}")]
    StartStream(String),
}

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("failed to initialize transcription model: {0}")]
    InitFailed(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

#[derive(Error, Debug)]
pub enum RegistryLoadError {
    #[error("failed to read action file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse action file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid regex key {key:?} in {path}: {source}")]
    InvalidPattern {
        path: String,
        key: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("handler {handler} failed: {reason}")]
    Failed { handler: String, reason: String },
}
