//! Delegate list state for one Safe and delegator
//!
//! ```text
//! Idle -> Loading -> Loaded | Failed
//! Loaded -> Mutating -> Loaded                (mutation applied, list re-read)
//! Loaded -> Mutating -> Failed -> Loaded      (mutation failed, list re-read)
//! ```
//!
//! Mutations start only from `Loaded`; any other state is rejected with
//! `DelegateError::SessionNotLoaded` before the signer is asked.
//!
//! The list is never patched locally. After every mutation attempt that
//! reached the service the session re-reads it, so concurrent changes made
//! elsewhere show up too.

use tracing::debug;

use crate::address::{Address, SafeAddress};
use crate::chains::ChainId;
use crate::client::{Delegate, SafeServiceClient};
use crate::errors::DelegateError;
use crate::signer::MessageSigner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Loading,
    Loaded,
    Mutating,
    Failed,
}

/// Result of a mutation that did not error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The service accepted the change and the list was re-read
    Applied,
    /// No signer, or the signer declined; nothing was sent
    Cancelled,
}

enum Mutation<'a> {
    Add { delegate: &'a Address, label: &'a str },
    Remove { delegate: &'a Address },
}

pub struct DelegateSession {
    chain_id: ChainId,
    safe: SafeAddress,
    delegator: Address,
    state: SessionState,
    delegates: Vec<Delegate>,
}

impl DelegateSession {
    pub fn new(chain_id: ChainId, safe: SafeAddress, delegator: Address) -> Self {
        Self {
            chain_id,
            safe,
            delegator,
            state: SessionState::Idle,
            delegates: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while a load or mutation is in flight; views disable their
    /// add/remove actions while this holds
    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Loading | SessionState::Mutating)
    }

    /// Last successfully loaded list, in server order
    pub fn delegates(&self) -> &[Delegate] {
        &self.delegates
    }

    pub fn safe(&self) -> &SafeAddress {
        &self.safe
    }

    pub fn delegator(&self) -> &Address {
        &self.delegator
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Fetches the delegate list from the service
    pub async fn load(&mut self, client: &SafeServiceClient) -> Result<&[Delegate], DelegateError> {
        self.state = SessionState::Loading;
        match client
            .list_delegates(self.chain_id, &self.safe, &self.delegator)
            .await
        {
            Ok(delegates) => {
                self.delegates = delegates;
                self.state = SessionState::Loaded;
                Ok(&self.delegates)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Adds (or relabels) a delegate, then reloads
    pub async fn add(
        &mut self,
        client: &SafeServiceClient,
        signer: Option<&dyn MessageSigner>,
        delegate: &Address,
        label: &str,
    ) -> Result<MutationOutcome, DelegateError> {
        self.mutate(client, signer, Mutation::Add { delegate, label })
            .await
    }

    /// Removes a delegate, then reloads
    pub async fn remove(
        &mut self,
        client: &SafeServiceClient,
        signer: Option<&dyn MessageSigner>,
        delegate: &Address,
    ) -> Result<MutationOutcome, DelegateError> {
        self.mutate(client, signer, Mutation::Remove { delegate })
            .await
    }

    async fn mutate(
        &mut self,
        client: &SafeServiceClient,
        signer: Option<&dyn MessageSigner>,
        mutation: Mutation<'_>,
    ) -> Result<MutationOutcome, DelegateError> {
        if self.state != SessionState::Loaded {
            return Err(DelegateError::SessionNotLoaded(format!("{:?}", self.state)));
        }
        self.state = SessionState::Mutating;

        let result = match mutation {
            Mutation::Add { delegate, label } => {
                client
                    .add_delegate(
                        self.chain_id,
                        &self.safe,
                        &self.delegator,
                        delegate,
                        label,
                        signer,
                    )
                    .await
            }
            Mutation::Remove { delegate } => {
                client
                    .remove_delegate(self.chain_id, &self.delegator, delegate, signer)
                    .await
            }
        };

        match result {
            Ok(()) => {
                self.load(client).await?;
                Ok(MutationOutcome::Applied)
            }
            Err(e) if e.is_cancellation() => {
                debug!(safe = %self.safe, "Delegate mutation cancelled");
                self.state = SessionState::Loaded;
                Ok(MutationOutcome::Cancelled)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                // Re-read ground truth; the mutation error is what the caller sees
                if let Err(reload) = self.load(client).await {
                    debug!(safe = %self.safe, error = %reload, "Reload after failed mutation failed");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> DelegateSession {
        let safes: Vec<SafeAddress> = serde_json::from_str("[\"0xSafe1\"]").unwrap();
        DelegateSession::new(ChainId::MAINNET, safes[0].clone(), Address::new("0xA1"))
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = session();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_busy());
        assert!(session.delegates().is_empty());
        assert_eq!(session.safe().as_str(), "0xSafe1");
    }

    #[tokio::test]
    async fn test_mutation_before_load_is_rejected() {
        let client = SafeServiceClient::new(crate::client::ClientConfig::default()).unwrap();
        let signer = crate::test_utils::StubSigner::returning("SIG");
        let mut session = session();

        let err = session
            .add(&client, Some(&signer), &Address::new("0xD1"), "Treasurer")
            .await
            .unwrap_err();

        assert!(matches!(err, DelegateError::SessionNotLoaded(ref state) if state == "Idle"));
        assert!(!err.is_cancellation());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(signer.messages().is_empty());
    }
}
