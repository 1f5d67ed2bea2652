use std::fmt;

use crate::chains::ChainId;

/// Why the transaction service did not accept a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Non-2xx response, with the body kept for display
    Status { status: u16, body: String },
    /// No response within the client's timeout
    Timeout,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } if body.is_empty() => write!(f, "HTTP {status}"),
            Self::Status { status, body } => write!(f, "HTTP {status}: {body}"),
            Self::Timeout => f.write_str("request timed out"),
        }
    }
}

/// Error type for delegate management operations
#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    /// The chain has no transaction service in the registry
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(ChainId),

    /// No signer is connected
    #[error("No signer available to authorize the request")]
    NoSigner,

    /// The signer declined to sign
    #[error("Signature request was rejected")]
    SignatureRejected,

    #[error("Signer failed: {0}")]
    SignerFailed(String),

    /// The service answered with a non-2xx status or timed out
    #[error("Request rejected: {0}")]
    RequestRejected(Rejection),

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// A 2xx response whose body could not be decoded
    #[error("Invalid response from transaction service: {0}")]
    InvalidResponse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The address cannot be used as a single URL path segment
    #[error("Invalid address: '{0}'")]
    InvalidAddress(String),

    /// A session mutation was attempted outside the `Loaded` state
    #[error("Delegate list is not loaded (session is {0})")]
    SessionNotLoaded(String),
}

impl DelegateError {
    /// True when the user (or a missing wallet) cancelled the authorization
    /// step. Views treat these as a no-op rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::NoSigner | Self::SignatureRejected)
    }

    /// HTTP status carried by a rejection, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestRejected(Rejection::Status { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DelegateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::RequestRejected(Rejection::Timeout)
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}
