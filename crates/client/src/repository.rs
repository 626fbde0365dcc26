//! Data-access facade used by the list and detail screens.
//!
//! Reads go through the [`ResourceCache`]; raw responses are normalized
//! before they are cached, so the cache only ever holds canonical records.
//! Mutations go straight to the transport and invalidate their resource kind
//! once the backend has accepted them. A failed mutation leaves the cache
//! alone: nothing changed server-side.

use std::sync::Arc;

use petadmin_shared::{
    normalize, normalize_listing, ApiError, DomainRecord, Item, Listing, Pet, Player, RecordId,
    ResourceKind,
};
use serde_json::Value;

use crate::api_client::{Method, Transport};
use crate::cache::{CacheKey, ResourceCache};
use crate::routes;

/// Result of a UI-facing read.
///
/// `data` may be present together with `error`: that is the last good value
/// kept on screen while the refetch failed.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub data: Option<Arc<Listing>>,
    pub error: Option<ApiError>,
}

impl ReadOutcome {
    pub fn is_stale(&self) -> bool {
        self.data.is_some() && self.error.is_some()
    }
}

#[derive(Clone)]
pub struct Repository {
    transport: Arc<dyn Transport>,
    cache: Arc<ResourceCache<Listing>>,
}

impl Repository {
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<ResourceCache<Listing>>) -> Self {
        Self { transport, cache }
    }

    pub fn cache(&self) -> &Arc<ResourceCache<Listing>> {
        &self.cache
    }

    // --- Reads ---

    /// Whole collection of `kind`.
    pub async fn list(&self, kind: ResourceKind) -> Result<Arc<Listing>, ApiError> {
        let transport = self.transport.clone();
        self.cache
            .get_or_fetch(CacheKey::all(kind), move || fetch_listing(transport, kind, routes::collection(kind)))
            .await
    }

    /// One server-side page of `kind`.
    pub async fn page(
        &self,
        kind: ResourceKind,
        page: u64,
        size: u64,
    ) -> Result<Arc<Listing>, ApiError> {
        let transport = self.transport.clone();
        let path = routes::paginated(kind, page, size);
        self.cache
            .get_or_fetch(CacheKey::page(kind, page, size), move || fetch_listing(transport, kind, path))
            .await
    }

    /// Server-side keyword search.
    pub async fn search(
        &self,
        kind: ResourceKind,
        keyword: &str,
        page: u64,
        size: u64,
    ) -> Result<Arc<Listing>, ApiError> {
        let transport = self.transport.clone();
        let path = routes::search(kind, keyword, page, size);
        self.cache
            .get_or_fetch(CacheKey::search(kind, keyword, page, size), move || {
                fetch_listing(transport, kind, path)
            })
            .await
    }

    /// A single record by id.
    pub async fn get(&self, kind: ResourceKind, id: RecordId) -> Result<DomainRecord, ApiError> {
        let transport = self.transport.clone();
        let listing = self
            .cache
            .get_or_fetch(CacheKey::record(kind, id), move || async move {
                let raw = transport.send(Method::GET, &routes::record(kind, id), None).await?;
                Ok(Listing::new(vec![normalize(kind, record_body(&raw))]))
            })
            .await?;
        listing
            .records
            .first()
            .cloned()
            .ok_or_else(|| ApiError::Deserialize(format!("empty response for {kind} {id}")))
    }

    /// Whole collection, falling back to the last cached value on failure.
    pub async fn read(&self, kind: ResourceKind) -> ReadOutcome {
        let result = self.list(kind).await;
        self.outcome(kind, result)
    }

    /// Refetch the whole collection regardless of freshness.
    pub async fn reload(&self, kind: ResourceKind) -> ReadOutcome {
        let transport = self.transport.clone();
        let result = self
            .cache
            .refresh(CacheKey::all(kind), move || fetch_listing(transport, kind, routes::collection(kind)))
            .await;
        self.outcome(kind, result)
    }

    fn outcome(&self, kind: ResourceKind, result: Result<Arc<Listing>, ApiError>) -> ReadOutcome {
        match result {
            Ok(data) => ReadOutcome {
                data: Some(data),
                error: None,
            },
            Err(error) => {
                let data = self.cache.peek_stale(&CacheKey::all(kind));
                if data.is_some() {
                    tracing::warn!(%kind, error = %error, "serving last known data after failed fetch");
                }
                ReadOutcome {
                    data,
                    error: Some(error),
                }
            }
        }
    }

    pub async fn players(&self) -> Result<Vec<Player>, ApiError> {
        Ok(self.list(ResourceKind::Players).await?.players())
    }

    pub async fn pets(&self) -> Result<Vec<Pet>, ApiError> {
        Ok(self.list(ResourceKind::Pets).await?.pets())
    }

    pub async fn items(&self) -> Result<Vec<Item>, ApiError> {
        Ok(self.list(ResourceKind::Items).await?.items())
    }

    // --- Mutations ---

    pub async fn create(&self, kind: ResourceKind, body: Value) -> Result<DomainRecord, ApiError> {
        let raw = self
            .mutate(kind, Method::POST, routes::collection(kind), Some(body))
            .await?;
        Ok(normalize(kind, record_body(&raw)))
    }

    pub async fn update(
        &self,
        kind: ResourceKind,
        id: RecordId,
        body: Value,
    ) -> Result<DomainRecord, ApiError> {
        let raw = self
            .mutate(kind, Method::PUT, routes::record(kind, id), Some(body))
            .await?;
        Ok(normalize(kind, record_body(&raw)))
    }

    pub async fn delete(&self, kind: ResourceKind, id: RecordId) -> Result<(), ApiError> {
        self.mutate(kind, Method::DELETE, routes::record(kind, id), None)
            .await
            .map(|_| ())
    }

    pub async fn update_pet(&self, id: RecordId, patch: Value) -> Result<Pet, ApiError> {
        match self.update(ResourceKind::Pets, id, patch).await? {
            DomainRecord::Pet(pet) => Ok(pet),
            other => Err(ApiError::Deserialize(format!("expected a pet, got {:?}", other.kind()))),
        }
    }

    pub async fn ban_player(&self, id: RecordId) -> Result<(), ApiError> {
        self.mutate(ResourceKind::Players, Method::PUT, routes::ban_player(id), None)
            .await
            .map(|_| ())
    }

    pub async fn unban_player(&self, id: RecordId) -> Result<(), ApiError> {
        self.mutate(ResourceKind::Players, Method::PUT, routes::unban_player(id), None)
            .await
            .map(|_| ())
    }

    async fn mutate(
        &self,
        kind: ResourceKind,
        method: Method,
        path: String,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let raw = self.transport.send(method.clone(), &path, body).await?;
        self.cache.invalidate(kind);
        tracing::info!(%kind, %method, %path, "mutation accepted; cache invalidated");
        Ok(raw)
    }
}

async fn fetch_listing(
    transport: Arc<dyn Transport>,
    kind: ResourceKind,
    path: String,
) -> Result<Listing, ApiError> {
    let raw = transport.send(Method::GET, &path, None).await?;
    Ok(normalize_listing(kind, &raw))
}

/// Unwrap `{data: {...}}` envelopes around a single record.
fn record_body(raw: &Value) -> &Value {
    match raw.get("data") {
        Some(data) if data.is_object() => data,
        _ => raw,
    }
}
