//! SDK boundary and the per-generator client cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::error::ModelError;
use crate::model::ServiceModel;

/// Client methods that are SDK helpers rather than service operations.
const CLIENT_HELPERS: [&str; 6] = [
    "can_paginate",
    "close",
    "get_paginator",
    "get_waiter",
    "generate_presigned_url",
    "generate_presigned_post",
];

/// A structured error returned by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    pub code: String,
    pub message: String,
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug)]
pub enum CallError {
    Service(ServiceError),
    Other(eyre::Report),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Service(e) => write!(f, "{}", e),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CallError {}

impl From<eyre::Report> for CallError {
    fn from(report: eyre::Report) -> Self {
        Self::Other(report)
    }
}

/// A live client bound to one service, profile and region.
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// Method names the client exposes, including SDK helpers.
    fn operation_names(&self) -> Vec<String>;

    async fn call(&self, operation: &str, params: Map<String, Value>) -> Result<Value, CallError>;
}

/// Creates clients and loads service models.
#[async_trait]
pub trait Session: Send + Sync {
    async fn client(
        &self,
        service_name: &str,
        profile_name: Option<&str>,
        region: &str,
    ) -> eyre::Result<Arc<dyn ServiceClient>>;

    fn service_model(&self, service_name: &str) -> Result<Arc<dyn ServiceModel>, ModelError>;
}

/// Operation names a client exposes, minus private names and SDK helpers.
pub fn list_operations(client: &dyn ServiceClient) -> Vec<String> {
    client
        .operation_names()
        .into_iter()
        .filter(|name| !name.starts_with('_') && !CLIENT_HELPERS.contains(&name.as_str()))
        .collect()
}

type CacheKey = (Option<String>, String);
type ClientCell = Arc<OnceCell<Arc<dyn ServiceClient>>>;

/// Lazily creates one client per `(profile, region)` and keeps it for the
/// lifetime of the cache.
pub struct ClientCache {
    session: Arc<dyn Session>,
    service_name: String,
    profile_name: Option<String>,
    default_region: String,
    clients: Mutex<HashMap<CacheKey, ClientCell>>,
}

impl ClientCache {
    pub fn new(
        session: Arc<dyn Session>,
        service_name: impl Into<String>,
        profile_name: Option<String>,
        default_region: impl Into<String>,
    ) -> Self {
        Self {
            session,
            service_name: service_name.into(),
            profile_name,
            default_region: default_region.into(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn profile_name(&self) -> Option<&str> {
        self.profile_name.as_deref()
    }

    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    /// Returns the cached client for `region` (or the default region),
    /// creating it on first use.
    pub async fn get_client(&self, region: Option<&str>) -> eyre::Result<Arc<dyn ServiceClient>> {
        let region = region.filter(|r| !r.is_empty()).unwrap_or(&self.default_region);
        let key = (self.profile_name.clone(), region.to_string());

        // The map lock is only held to find the key's cell; concurrent first
        // calls for the same key wait on the cell, not on other regions.
        let cell = Arc::clone(self.lock_clients().entry(key).or_default());
        let client = cell
            .get_or_try_init(|| async {
                tracing::debug!(
                    service = %self.service_name,
                    region = %region,
                    profile = ?self.profile_name,
                    "Creating client"
                );
                self.session
                    .client(&self.service_name, self.profile_name.as_deref(), region)
                    .await
            })
            .await?;
        Ok(Arc::clone(client))
    }

    /// Number of clients created so far.
    pub fn len(&self) -> usize {
        self.lock_clients().values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_clients(&self) -> MutexGuard<'_, HashMap<CacheKey, ClientCell>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ClientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCache")
            .field("service_name", &self.service_name)
            .field("profile_name", &self.profile_name)
            .field("default_region", &self.default_region)
            .finish_non_exhaustive()
    }
}
