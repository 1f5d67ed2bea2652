use async_trait::async_trait;
use std::sync::Mutex;

use crate::signer::{MessageSigner, SignerError};

/// Signer double that records every message it is asked to sign
pub struct StubSigner {
    response: Result<String, SignerError>,
    messages: Mutex<Vec<String>>,
}

impl StubSigner {
    /// Signs every message with `signature`
    pub fn returning(signature: impl Into<String>) -> Self {
        Self {
            response: Ok(signature.into()),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Declines every request, like a user cancelling the wallet prompt
    pub fn declining() -> Self {
        Self {
            response: Err(SignerError::Declined),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            response: Err(SignerError::Failed(reason.into())),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Messages received so far, in order
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageSigner for StubSigner {
    async fn sign_message(&self, message: &str) -> Result<String, SignerError> {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.to_string());
        }
        self.response.clone()
    }
}
