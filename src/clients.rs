//! Client lifecycle: one CMA client per `(token, environment, kind)`.
//!
//! [`ClientManager::resolve`] returns the cached handle for a key or builds
//! one through a [`ClientFactory`]. Every caller resolving the same key sees
//! the same instance until that key is evicted. The cache is bounded: once
//! more than `max_cached` keys are live, the least recently resolved key is
//! dropped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use reqwest::Client;
use tracing::debug;

use crate::cma::{CmaApi, CollaboratorsClient, HttpCmaClient, RecordsClient};
use crate::config::CmaConfig;
use crate::{Error, Result};

/// API token plus optional environment name, supplied per call
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    token: String,
    environment: Option<String>,
}

impl Credential {
    /// Create a credential; an empty environment means the primary one
    pub fn new(token: impl Into<String>, environment: Option<String>) -> Self {
        Self {
            token: token.into(),
            environment: environment.filter(|e| !e.is_empty()),
        }
    }

    /// The bearer token
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The environment name, `None` for the primary environment
    #[must_use]
    pub fn environment(&self) -> Option<&str> {
        self.environment.as_deref()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"***")
            .field("environment", &self.environment)
            .finish()
    }
}

/// Which adapter shape a handle exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    /// The raw [`CmaApi`]
    Default,
    /// [`RecordsClient`]
    Records,
    /// [`CollaboratorsClient`]
    Collaborators,
}

/// A resolved client
#[derive(Clone)]
pub enum ClientHandle {
    /// General-purpose client
    Default(Arc<dyn CmaApi>),
    /// Records-specialized adapter
    Records(Arc<RecordsClient>),
    /// Collaborators-specialized adapter
    Collaborators(Arc<CollaboratorsClient>),
}

impl ClientHandle {
    /// The kind this handle was built for
    #[must_use]
    pub fn kind(&self) -> ClientKind {
        match self {
            Self::Default(_) => ClientKind::Default,
            Self::Records(_) => ClientKind::Records,
            Self::Collaborators(_) => ClientKind::Collaborators,
        }
    }

    /// The underlying API, whatever the adapter
    #[must_use]
    pub fn api(&self) -> Arc<dyn CmaApi> {
        match self {
            Self::Default(api) => Arc::clone(api),
            Self::Records(r) => r.api(),
            Self::Collaborators(c) => c.api(),
        }
    }

    /// The records adapter
    pub fn records(&self) -> Result<&RecordsClient> {
        match self {
            Self::Records(r) => Ok(r),
            other => Err(Error::Internal(format!(
                "expected a records client, got {:?}",
                other.kind()
            ))),
        }
    }

    /// The collaborators adapter
    pub fn collaborators(&self) -> Result<&CollaboratorsClient> {
        match self {
            Self::Collaborators(c) => Ok(c),
            other => Err(Error::Internal(format!(
                "expected a collaborators client, got {:?}",
                other.kind()
            ))),
        }
    }

    /// Whether both handles are the same instance
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Default(a), Self::Default(b)) => Arc::ptr_eq(a, b),
            (Self::Records(a), Self::Records(b)) => Arc::ptr_eq(a, b),
            (Self::Collaborators(a), Self::Collaborators(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Builds the raw API client for a credential.
///
/// Must not fail: a bad credential surfaces on first use.
pub trait ClientFactory: Send + Sync {
    /// Build a client bound to `credential`
    fn build(&self, credential: &Credential) -> Arc<dyn CmaApi>;
}

/// Factory producing [`HttpCmaClient`]s over one shared connection pool
pub struct HttpClientFactory {
    http: Client,
    config: CmaConfig,
}

impl HttpClientFactory {
    /// Create the factory and its shared HTTP client
    pub fn new(config: CmaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("datocms-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, credential: &Credential) -> Arc<dyn CmaApi> {
        Arc::new(HttpCmaClient::new(self.http.clone(), &self.config, credential))
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    credential: Credential,
    kind: ClientKind,
}

struct CachedClient {
    handle: ClientHandle,
    last_used: AtomicU64,
}

/// Process-wide client cache
pub struct ClientManager {
    factory: Arc<dyn ClientFactory>,
    entries: DashMap<ClientKey, CachedClient>,
    max_cached: usize,
    clock: AtomicU64,
}

impl ClientManager {
    /// Create a manager holding at most `max_cached` clients
    pub fn new(factory: Arc<dyn ClientFactory>, max_cached: usize) -> Self {
        Self {
            factory,
            entries: DashMap::new(),
            max_cached: max_cached.max(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Return the client for `(credential, kind)`, building it on first use.
    pub fn resolve(&self, credential: &Credential, kind: ClientKind) -> ClientHandle {
        let key = ClientKey {
            credential: credential.clone(),
            kind,
        };
        let now = self.tick();

        if let Some(cached) = self.entries.get(&key) {
            cached.last_used.store(now, Ordering::Relaxed);
            debug!(?kind, environment = ?credential.environment(), "Client cache hit");
            return cached.handle.clone();
        }

        // The entry guard makes concurrent first resolves of one key build once.
        let handle = match self.entries.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                occupied.get().last_used.store(now, Ordering::Relaxed);
                occupied.get().handle.clone()
            }
            Entry::Vacant(vacant) => {
                debug!(?kind, environment = ?credential.environment(), "Client cache miss");
                let handle = self.build(credential, kind);
                vacant.insert(CachedClient {
                    handle: handle.clone(),
                    last_used: AtomicU64::new(now),
                });
                handle
            }
        };

        self.evict_overflow(&key);
        handle
    }

    /// Drop every cached client (all kinds) for `credential`; returns how many
    pub fn evict(&self, credential: &Credential) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| &key.credential != credential);
        before.saturating_sub(self.entries.len())
    }

    /// Drop every cached client
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached clients
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn build(&self, credential: &Credential, kind: ClientKind) -> ClientHandle {
        let api = self.factory.build(credential);
        match kind {
            ClientKind::Default => ClientHandle::Default(api),
            ClientKind::Records => ClientHandle::Records(Arc::new(RecordsClient::new(api))),
            ClientKind::Collaborators => {
                ClientHandle::Collaborators(Arc::new(CollaboratorsClient::new(api)))
            }
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Evict least recently used keys until the bound holds, never `keep`.
    fn evict_overflow(&self, keep: &ClientKey) {
        while self.entries.len() > self.max_cached {
            let oldest = self
                .entries
                .iter()
                .filter(|e| e.key() != keep)
                .min_by_key(|e| e.value().last_used.load(Ordering::Relaxed))
                .map(|e| e.key().clone());

            let Some(oldest) = oldest else { break };
            self.entries.remove(&oldest);
            debug!(kind = ?oldest.kind, "Evicted least recently used client");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticFactory;

    fn manager(max: usize) -> (ClientManager, Arc<StaticFactory>) {
        let factory = Arc::new(StaticFactory::default());
        let manager = ClientManager::new(Arc::clone(&factory) as Arc<dyn ClientFactory>, max);
        (manager, factory)
    }

    #[test]
    fn same_key_returns_same_instance() {
        let (manager, factory) = manager(8);
        let cred = Credential::new("tok", Some("main".to_string()));

        let a = manager.resolve(&cred, ClientKind::Records);
        let b = manager.resolve(&cred, ClientKind::Records);

        assert!(a.same_instance(&b));
        assert_eq!(factory.built(), 1);
    }

    #[test]
    fn different_environment_or_kind_is_distinct() {
        let (manager, _) = manager(8);
        let main = Credential::new("tok", Some("main".to_string()));
        let sandbox = Credential::new("tok", Some("sandbox".to_string()));

        let a = manager.resolve(&main, ClientKind::Default);
        let b = manager.resolve(&sandbox, ClientKind::Default);
        let c = manager.resolve(&main, ClientKind::Collaborators);

        assert!(!a.same_instance(&b));
        assert!(!a.same_instance(&c));
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn empty_environment_is_primary() {
        let (manager, _) = manager(8);
        let a = manager.resolve(&Credential::new("tok", None), ClientKind::Default);
        let b = manager.resolve(&Credential::new("tok", Some(String::new())), ClientKind::Default);
        assert!(a.same_instance(&b));
    }

    #[test]
    fn least_recently_used_is_evicted_past_bound() {
        // GIVEN: a cache bounded at two entries
        let (manager, _) = manager(2);
        let first = Credential::new("first", None);
        let second = Credential::new("second", None);
        let third = Credential::new("third", None);

        let first_handle = manager.resolve(&first, ClientKind::Default);
        manager.resolve(&second, ClientKind::Default);
        // touch `first` so `second` becomes the oldest
        manager.resolve(&first, ClientKind::Default);

        // WHEN: a third key arrives
        manager.resolve(&third, ClientKind::Default);

        // THEN: `second` was evicted, `first` kept its identity
        assert_eq!(manager.len(), 2);
        assert!(manager.resolve(&first, ClientKind::Default).same_instance(&first_handle));
        assert!(!manager.entries.contains_key(&ClientKey {
            credential: second,
            kind: ClientKind::Default
        }));
    }

    #[test]
    fn evict_drops_all_kinds_of_a_credential() {
        let (manager, factory) = manager(8);
        let cred = Credential::new("tok", None);
        manager.resolve(&cred, ClientKind::Default);
        manager.resolve(&cred, ClientKind::Records);
        manager.resolve(&Credential::new("other", None), ClientKind::Default);

        assert_eq!(manager.evict(&cred), 2);
        assert_eq!(manager.len(), 1);

        manager.resolve(&cred, ClientKind::Default);
        assert_eq!(factory.built(), 4);
    }

    #[test]
    fn handle_accessors_check_kind() {
        let (manager, _) = manager(8);
        let cred = Credential::new("tok", None);
        assert!(manager.resolve(&cred, ClientKind::Records).records().is_ok());
        assert!(manager.resolve(&cred, ClientKind::Default).records().is_err());
        assert!(manager.resolve(&cred, ClientKind::Collaborators).collaborators().is_ok());
    }

    #[test]
    fn credential_debug_redacts_token() {
        let rendered = format!("{:?}", Credential::new("super-secret", None));
        assert!(!rendered.contains("super-secret"));
    }
}
