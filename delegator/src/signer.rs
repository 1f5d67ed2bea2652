use async_trait::async_trait;

/// Outcome of a signing request that produced no signature
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignerError {
    /// The key holder refused (e.g. cancelled the wallet prompt)
    #[error("signature declined")]
    Declined,
    #[error("{0}")]
    Failed(String),
}

/// External capability that signs human-readable messages
///
/// Implementations apply the personal-message (EIP-191) prefix themselves and
/// return the signature as a `0x`-prefixed hex string. Key material never
/// crosses this boundary.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    async fn sign_message(&self, message: &str) -> Result<String, SignerError>;
}
