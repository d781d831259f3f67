use crate::models::{ImageBlob, Listing};
use anyhow::Result;
use async_trait::async_trait;

/// Document persistence for listings.
///
/// These are the only operations the app performs against the hosted
/// document database: fetch by id, full-document replace, and the
/// newest-first query behind the home-page carousel.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Fetch a listing by id. `Ok(None)` means the document does not exist.
    async fn get(&self, id: &str) -> Result<Option<Listing>>;

    /// Replace the stored document for `id` with `listing`.
    async fn update(&self, id: &str, listing: &Listing) -> Result<()>;

    /// Newest listings first, at most `limit` of them, with their ids.
    async fn recent(&self, limit: usize) -> Result<Vec<(String, Listing)>>;
}

/// Binary blob storage returning a durable retrieval URL.
///
/// Upload progress is advisory only; callers report it through tracing and
/// never gate correctness on it.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `blob` under `key` and return the URL it can be fetched from.
    async fn upload(&self, key: &str, blob: &ImageBlob) -> Result<String>;
}

/// A geocoding hit: coordinates plus the provider's canonical address.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAddress {
    pub lat: f64,
    pub lng: f64,
    pub formatted: String,
}

/// Free-text address resolution.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve `address` to coordinates and a canonical address string.
    /// `Ok(None)` means the provider found no results.
    async fn resolve(&self, address: &str) -> Result<Option<ResolvedAddress>>;
}

/// Identity of the current actor.
pub trait AuthContext: Send + Sync {
    /// Id of the signed-in user, or `None` when unauthenticated.
    fn current_user_id(&self) -> Option<String>;
}

/// AuthContext backed by a user id established at startup.
pub struct SignedInUser {
    user_id: String,
}

impl SignedInUser {
    pub fn new(user_id: String) -> Self {
        Self { user_id }
    }
}

impl AuthContext for SignedInUser {
    fn current_user_id(&self) -> Option<String> {
        Some(self.user_id.clone())
    }
}
