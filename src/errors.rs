use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("config error: {0}")]
    Config(String),
    #[error("event loop error: {0}")]
    EventLoop(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("no output available")]
    NoOutput,
}

pub type Result<T, E = CompositorError> = std::result::Result<T, E>;
