//! REST client for the Safe transaction service
//!
//! Reads (owned Safes, delegates) are public. Writes carry a signature from
//! [`DelegateAuthorizer`], obtained immediately before the request and
//! consumed by it.

use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::address::{Address, SafeAddress};
use crate::auth::{AuthorizedRequest, DelegateAuthorizer};
use crate::chains::{ChainId, ChainRegistry, endpoint};
use crate::clock::{Clock, SystemClock};
use crate::errors::{DelegateError, Rejection};
use crate::signer::MessageSigner;

/// Default bound on every request to the service
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// Upper bound on followed `next` links for one delegate listing
const MAX_DELEGATE_PAGES: usize = 100;

const DELEGATES_PATH: &[&str] = &["api", "v1", "delegates"];

/// A delegate of a Safe, as recorded by the transaction service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delegate {
    pub address: Address,
    pub label: String,
}

/// Settings for [`SafeServiceClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub registry: ChainRegistry,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            registry: ChainRegistry::default(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("safe-delegator/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: ChainRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OwnerSafesResponse {
    safes: Vec<SafeAddress>,
}

#[derive(Debug, Deserialize)]
struct DelegatesPage {
    #[serde(default)]
    next: Option<String>,
    results: Vec<DelegateRecord>,
}

#[derive(Debug, Deserialize)]
struct DelegateRecord {
    delegate: Address,
    #[serde(default)]
    label: String,
}

#[derive(Debug, Serialize)]
struct AddDelegateBody<'a> {
    safe: &'a str,
    delegator: &'a str,
    delegate: &'a str,
    signature: &'a str,
    label: &'a str,
}

#[derive(Debug, Serialize)]
struct RemoveDelegateBody<'a> {
    delegator: &'a str,
    delegate: &'a str,
    signature: &'a str,
}

/// Client for the owner and delegate endpoints of the transaction service
#[derive(Clone)]
pub struct SafeServiceClient {
    http: reqwest::Client,
    registry: ChainRegistry,
    authorizer: DelegateAuthorizer,
}

impl SafeServiceClient {
    /// Builds a client that reads time from the system clock
    pub fn new(config: ClientConfig) -> Result<Self, DelegateError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(DelegateError::Transport)?;

        Ok(Self {
            http,
            registry: config.registry,
            authorizer: DelegateAuthorizer::new(Arc::new(SystemClock)),
        })
    }

    /// Replaces the clock used for authorization windows
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.authorizer = DelegateAuthorizer::new(clock);
        self
    }

    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    pub fn authorizer(&self) -> &DelegateAuthorizer {
        &self.authorizer
    }

    fn url(&self, chain_id: ChainId, segments: &[&str]) -> Result<Url, DelegateError> {
        let base = self.registry.resolve_base_url(chain_id)?;
        endpoint(base, segments)
    }

    /// Resolves a pagination link against the chain's service root
    ///
    /// Relative links are accepted. Absolute links must stay on the same
    /// origin as the service root.
    fn next_page_url(&self, chain_id: ChainId, next: &str) -> Result<Url, DelegateError> {
        let base = self.registry.resolve_base_url(chain_id)?;
        let url = base.join(next).map_err(|e| {
            DelegateError::InvalidResponse(format!("invalid pagination link '{next}': {e}"))
        })?;
        if url.origin() != base.origin() {
            return Err(DelegateError::InvalidResponse(format!(
                "pagination link '{next}' leaves {}",
                base.origin().ascii_serialization()
            )));
        }
        Ok(url)
    }

    /// Lists the Safes where `owner` is a signer
    ///
    /// An owner without Safes yields an empty list.
    pub async fn list_owner_safes(
        &self,
        chain_id: ChainId,
        owner: &Address,
    ) -> Result<Vec<SafeAddress>, DelegateError> {
        let url = self.url(
            chain_id,
            &["api", "v1", "owners", path_segment(owner)?, "safes"],
        )?;
        debug!(chain = %chain_id, %url, "Fetching owner safes");

        let response = self.http.get(url).send().await?;
        let response = ensure_success(response).await?;
        let body: OwnerSafesResponse = response.json().await?;

        debug!(chain = %chain_id, count = body.safes.len(), "Fetched owner safes");
        Ok(body.safes)
    }

    /// Lists the delegates `delegator` registered for `safe`
    ///
    /// Server order is preserved, across pages when the service paginates.
    pub async fn list_delegates(
        &self,
        chain_id: ChainId,
        safe: &SafeAddress,
        delegator: &Address,
    ) -> Result<Vec<Delegate>, DelegateError> {
        let url = self.url(chain_id, DELEGATES_PATH)?;
        debug!(chain = %chain_id, %url, %safe, %delegator, "Fetching delegates");

        let response = self
            .http
            .get(url)
            .query(&[("safe", safe.as_str()), ("delegator", delegator.as_str())])
            .send()
            .await?;
        let mut page: DelegatesPage = ensure_success(response).await?.json().await?;

        let mut delegates = Vec::new();
        let mut pages = 1;
        loop {
            delegates.extend(page.results.into_iter().map(|record| Delegate {
                address: record.delegate,
                label: record.label,
            }));

            let Some(next) = page.next.filter(|next| !next.is_empty()) else {
                break;
            };
            if pages == MAX_DELEGATE_PAGES {
                return Err(DelegateError::InvalidResponse(format!(
                    "delegate listing exceeded {MAX_DELEGATE_PAGES} pages"
                )));
            }

            let next = self.next_page_url(chain_id, &next)?;
            debug!(chain = %chain_id, url = %next, "Fetching next delegates page");
            let response = self.http.get(next).send().await?;
            page = ensure_success(response).await?.json().await?;
            pages += 1;
        }

        debug!(chain = %chain_id, count = delegates.len(), pages, "Fetched delegates");
        Ok(delegates)
    }

    /// Adds `delegate` to `safe` on behalf of `delegator`, or relabels it
    ///
    /// The signature is collected first; if that step fails nothing is sent.
    pub async fn add_delegate(
        &self,
        chain_id: ChainId,
        safe: &SafeAddress,
        delegator: &Address,
        delegate: &Address,
        label: &str,
        signer: Option<&dyn MessageSigner>,
    ) -> Result<(), DelegateError> {
        let url = self.url(chain_id, DELEGATES_PATH)?;
        let authorization = self.authorizer.authorize(delegate, signer).await?;
        self.post_delegate(chain_id, &url, safe, delegator, label, authorization)
            .await
    }

    async fn post_delegate(
        &self,
        chain_id: ChainId,
        url: &Url,
        safe: &SafeAddress,
        delegator: &Address,
        label: &str,
        authorization: AuthorizedRequest,
    ) -> Result<(), DelegateError> {
        let (delegate, signature) = authorization.into_parts();
        let body = AddDelegateBody {
            safe: safe.as_str(),
            delegator: delegator.as_str(),
            delegate: delegate.as_str(),
            signature: &signature,
            label,
        };

        debug!(chain = %chain_id, %url, %safe, %delegate, "Adding delegate");
        let response = self.http.post(url.clone()).json(&body).send().await?;
        let response = ensure_success(response).await?;
        debug!(chain = %chain_id, status = %response.status(), %delegate, "Delegate added");
        Ok(())
    }

    /// Removes `delegate` from every Safe of `delegator`
    ///
    /// A delegate the service no longer knows (404) counts as removed.
    pub async fn remove_delegate(
        &self,
        chain_id: ChainId,
        delegator: &Address,
        delegate: &Address,
        signer: Option<&dyn MessageSigner>,
    ) -> Result<(), DelegateError> {
        let url = self.url(
            chain_id,
            &["api", "v1", "delegates", path_segment(delegate)?],
        )?;
        let authorization = self.authorizer.authorize(delegate, signer).await?;
        let (delegate, signature) = authorization.into_parts();

        // The service expects the proof in the body, even for DELETE
        let body = RemoveDelegateBody {
            delegator: delegator.as_str(),
            delegate: delegate.as_str(),
            signature: &signature,
        };

        debug!(chain = %chain_id, %url, %delegate, "Removing delegate");
        let response = self.http.delete(url).json(&body).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(chain = %chain_id, %delegate, "Delegate already absent");
            return Ok(());
        }
        let response = ensure_success(response).await?;
        debug!(chain = %chain_id, status = %response.status(), %delegate, "Delegate removed");
        Ok(())
    }

    /// [`add_delegate`](Self::add_delegate), then re-reads the delegate list
    pub async fn add_delegate_and_reload(
        &self,
        chain_id: ChainId,
        safe: &SafeAddress,
        delegator: &Address,
        delegate: &Address,
        label: &str,
        signer: Option<&dyn MessageSigner>,
    ) -> Result<Vec<Delegate>, DelegateError> {
        self.add_delegate(chain_id, safe, delegator, delegate, label, signer)
            .await?;
        self.list_delegates(chain_id, safe, delegator).await
    }

    /// [`remove_delegate`](Self::remove_delegate), then re-reads the delegate
    /// list of `safe`
    pub async fn remove_delegate_and_reload(
        &self,
        chain_id: ChainId,
        safe: &SafeAddress,
        delegator: &Address,
        delegate: &Address,
        signer: Option<&dyn MessageSigner>,
    ) -> Result<Vec<Delegate>, DelegateError> {
        self.remove_delegate(chain_id, delegator, delegate, signer)
            .await?;
        self.list_delegates(chain_id, safe, delegator).await
    }
}

/// An address as a single URL path segment
///
/// Segments that the URL parser would drop or collapse are rejected.
fn path_segment(address: &Address) -> Result<&str, DelegateError> {
    match address.as_str() {
        "" | "." | ".." => Err(DelegateError::InvalidAddress(address.to_string())),
        segment => Ok(segment),
    }
}

async fn ensure_success(response: Response) -> Result<Response, DelegateError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    debug!(%status, %body, "Transaction service rejected request");
    Err(DelegateError::RequestRejected(Rejection::Status {
        status: status.as_u16(),
        body,
    }))
}
