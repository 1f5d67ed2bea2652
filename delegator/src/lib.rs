//! `Safe` delegate management
//!
//! Discovers the Safes an owner controls and adds or removes delegates through
//! the Safe transaction service. Mutations are authorized with a signature over
//! a time-windowed message (see [`auth`]), so no session or API key is needed.
#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod address;
pub mod auth;
pub mod chains;
pub mod client;
pub mod clock;
pub mod config;
pub mod errors;
pub mod session;
pub mod signer;
pub mod test_utils;

pub use address::{Address, SafeAddress};
pub use auth::{AuthorizedRequest, DelegateAuthorizer, delegate_totp_message, totp_window};
pub use chains::{ChainEntry, ChainId, ChainRegistry};
pub use client::{ClientConfig, Delegate, SafeServiceClient};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ServiceConfig;
pub use errors::{DelegateError, Rejection};
pub use session::{DelegateSession, MutationOutcome, SessionState};
pub use signer::{MessageSigner, SignerError};
