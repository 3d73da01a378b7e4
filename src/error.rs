use crate::api::Method;
use thiserror::Error;

/// Outcome of a failed script load. Cloned into every caller waiting on the
/// same in-flight load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("invalid HEYO script url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to load HEYO script {url}: {reason}")]
    ScriptFailed { url: String, reason: String },
    #[error("HEYO did not attach to the page after loading {url}")]
    NotAttached { url: String },
    #[error("HEYO script load ended without an outcome")]
    Aborted,
    #[error("HEYO load requested outside a tokio runtime")]
    NoRuntime,
}

#[derive(Debug, Error)]
pub enum DeferredError {
    #[error("HEYO script unavailable: {0}")]
    Load(#[from] LoadError),
    #[error("HEYO.{method} unavailable after {attempts} attempts (available: {available:?})")]
    MethodUnavailable {
        method: Method,
        attempts: u32,
        available: Vec<Method>,
    },
    #[error("HEYO.{method} failed: {reason}")]
    Invocation { method: Method, reason: String },
    #[error("HEYO.{method} called outside a tokio runtime")]
    NoRuntime { method: Method },
}

#[derive(Debug, Error)]
#[error("a HEYO proxy is already installed for this process")]
pub struct InstallError;
