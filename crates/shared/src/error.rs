use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("unknown subscription status '{0}'")]
    UnknownStatus(String),
    #[error("channel username is empty")]
    EmptyChannel,
    #[error("invalid channel username '{0}'")]
    InvalidChannel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleErrorKind {
    AccessDenied,
    Unreachable,
}

/// Failure of a membership lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The bot may not inspect the channel's member list, usually because it
    /// is not an administrator there.
    #[error("membership lookup denied: {0}")]
    AccessDenied(String),
    #[error("membership service unreachable: {0}")]
    Unreachable(String),
}

impl OracleError {
    pub fn kind(&self) -> OracleErrorKind {
        match self {
            OracleError::AccessDenied(_) => OracleErrorKind::AccessDenied,
            OracleError::Unreachable(_) => OracleErrorKind::Unreachable,
        }
    }
}
