//! Delegate authorization
//!
//! The transaction service accepts a delegate change when it carries the
//! delegator's signature over `"{delegate}{window}"`, where `window` is the
//! number of whole hours since the Unix epoch. The service recomputes the
//! message for its own current window, so a signature stops verifying once
//! the hour rolls over. There is no server nonce, so a captured signature can
//! be replayed within the same hour.
//!
//! # Example
//!
//! ```rust,ignore
//! let authorizer = DelegateAuthorizer::new(Arc::new(SystemClock));
//! let request = authorizer.authorize(&delegate, Some(&signer)).await?;
//! ```

use std::sync::Arc;
use tracing::trace;

use crate::address::Address;
use crate::clock::Clock;
use crate::errors::DelegateError;
use crate::signer::{MessageSigner, SignerError};

/// Length of an authorization window in seconds
pub const TOTP_WINDOW_SECONDS: u64 = 3600;

/// Hour bucket containing `unix_seconds`
pub fn totp_window(unix_seconds: u64) -> u64 {
    unix_seconds / TOTP_WINDOW_SECONDS
}

/// Message the delegator signs to authorize `delegate` during `window`
pub fn delegate_totp_message(delegate: &Address, window: u64) -> String {
    format!("{}{}", delegate.as_str(), window)
}

/// A signature authorizing one add or remove of one delegate
///
/// Produced by [`DelegateAuthorizer::authorize`] and moved into a single
/// request, so it is not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct AuthorizedRequest {
    delegate: Address,
    signature: String,
}

impl AuthorizedRequest {
    pub fn delegate(&self) -> &Address {
        &self.delegate
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn into_parts(self) -> (Address, String) {
        (self.delegate, self.signature)
    }
}

/// Builds time-windowed messages and collects signatures over them
#[derive(Clone)]
pub struct DelegateAuthorizer {
    clock: Arc<dyn Clock>,
}

impl DelegateAuthorizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn current_window(&self) -> u64 {
        totp_window(self.clock.now_unix_seconds())
    }

    /// The message that would be signed for `delegate` right now
    pub fn message_for(&self, delegate: &Address) -> String {
        delegate_totp_message(delegate, self.current_window())
    }

    /// Asks `signer` to authorize `delegate` for the current window
    ///
    /// # Errors
    /// * `NoSigner` if `signer` is `None`
    /// * `SignatureRejected` if the signer declines
    /// * `SignerFailed` if the signer itself errors
    pub async fn authorize(
        &self,
        delegate: &Address,
        signer: Option<&dyn MessageSigner>,
    ) -> Result<AuthorizedRequest, DelegateError> {
        let signer = signer.ok_or(DelegateError::NoSigner)?;

        let window = self.current_window();
        let message = delegate_totp_message(delegate, window);
        trace!(delegate = %delegate, window, "Requesting delegate authorization");

        let signature = signer
            .sign_message(&message)
            .await
            .map_err(|e| match e {
                SignerError::Declined => DelegateError::SignatureRejected,
                SignerError::Failed(reason) => DelegateError::SignerFailed(reason),
            })?;

        Ok(AuthorizedRequest {
            delegate: delegate.clone(),
            signature,
        })
    }
}
