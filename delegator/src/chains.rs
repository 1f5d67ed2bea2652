use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::DelegateError;

/// EIP-155 chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    pub const MAINNET: ChainId = ChainId(1);
    pub const GOERLI: ChainId = ChainId(5);
    pub const GNOSIS: ChainId = ChainId(100);
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A registered network and the root of its transaction service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub chain_id: ChainId,
    pub name: String,
    pub service_url: Url,
}

// Transaction service roots by chain ID
const DEFAULT_SERVICES: [(u64, &str, &str); 3] = [
    (1, "mainnet", "https://safe-transaction-mainnet.safe.global"),
    (5, "goerli", "https://safe-transaction-goerli.safe.global"),
    (100, "gnosis", "https://safe-transaction-gnosis-chain.safe.global"),
];

/// Maps chain IDs to transaction service base URLs
///
/// The client receives a registry at construction, so tests and custom
/// deployments can point any chain at their own service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRegistry {
    entries: BTreeMap<ChainId, ChainEntry>,
}

impl ChainRegistry {
    /// Creates a registry with no chains
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registers (or replaces) the service URL of a chain
    ///
    /// # Errors
    /// `DelegateError::Config` if `service_url` is not an absolute http(s) URL
    pub fn register(
        &mut self,
        chain_id: ChainId,
        name: impl Into<String>,
        service_url: &str,
    ) -> Result<(), DelegateError> {
        let url = Url::parse(service_url).map_err(|e| {
            DelegateError::Config(format!("invalid service URL '{service_url}': {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(DelegateError::Config(format!(
                "service URL '{service_url}' must be an absolute http(s) URL"
            )));
        }

        self.entries.insert(
            chain_id,
            ChainEntry {
                chain_id,
                name: name.into(),
                service_url: url,
            },
        );
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_endpoint(
        mut self,
        chain_id: ChainId,
        name: impl Into<String>,
        service_url: &str,
    ) -> Result<Self, DelegateError> {
        self.register(chain_id, name, service_url)?;
        Ok(self)
    }

    /// Resolves the base URL of a chain's transaction service
    pub fn resolve_base_url(&self, chain_id: ChainId) -> Result<&Url, DelegateError> {
        self.entries
            .get(&chain_id)
            .map(|entry| &entry.service_url)
            .ok_or(DelegateError::UnsupportedChain(chain_id))
    }

    /// Looks up a chain by name (case-insensitive) or decimal ID
    pub fn find(&self, name_or_id: &str) -> Option<ChainId> {
        let needle = name_or_id.trim();
        if let Ok(id) = needle.parse::<u64>() {
            let chain_id = ChainId(id);
            return self.entries.contains_key(&chain_id).then_some(chain_id);
        }
        self.entries
            .values()
            .find(|entry| entry.name.eq_ignore_ascii_case(needle))
            .map(|entry| entry.chain_id)
    }

    pub fn contains(&self, chain_id: ChainId) -> bool {
        self.entries.contains_key(&chain_id)
    }

    /// Registered chains ordered by ID
    pub fn chains(&self) -> impl Iterator<Item = &ChainEntry> {
        self.entries.values()
    }
}

impl Default for ChainRegistry {
    fn default() -> Self {
        let entries = DEFAULT_SERVICES
            .iter()
            .map(|&(id, name, url)| {
                let chain_id = ChainId(id);
                let entry = ChainEntry {
                    chain_id,
                    name: name.to_string(),
                    service_url: Url::parse(url).expect("Valid default service URL"),
                };
                (chain_id, entry)
            })
            .collect();
        Self { entries }
    }
}

/// Appends path segments to a service root, ending with a slash
///
/// Each segment is percent-encoded on its own, so a caller-supplied value
/// such as an address cannot add segments, a query or a fragment.
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, DelegateError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| DelegateError::Config(format!("service URL '{base}' cannot be a base")))?
        .pop_if_empty()
        .extend(segments)
        .push("");
    Ok(url)
}
