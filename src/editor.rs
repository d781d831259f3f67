use crate::models::{
    GeoPoint, ImageBlob, Listing, ListingKind, MAX_IMAGES, NAME_MAX_LEN, NAME_MIN_LEN, PRICE_MAX,
    PRICE_MIN, ROOMS_MAX, ROOMS_MIN,
};
use crate::services::traits::{Geocoder, ImageStore, ListingStore};
use anyhow::bail;
use chrono::Utc;
use futures::future::try_join_all;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Reasons a draft is rejected before anything is uploaded or persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFault {
    DiscountNotBelowRegular,
    TooManyImages,
    BadAddress,
}

impl fmt::Display for ValidationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            ValidationFault::DiscountNotBelowRegular => {
                "discounted price must be less than regular price"
            }
            ValidationFault::TooManyImages => "max 6 images",
            ValidationFault::BadAddress => "please enter a correct address",
        };
        f.write_str(message)
    }
}

/// Everything that can go wrong while loading or submitting an edit.
///
/// All variants are recoverable: the draft stays editable and the session
/// may resubmit. A failed submission never leaves a partial document behind.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("listing does not exist")]
    NotFound,
    #[error("you can not edit that listing")]
    Forbidden,
    #[error("{0}")]
    Validation(ValidationFault),
    #[error("images not uploaded")]
    Upload(#[source] anyhow::Error),
    #[error("listing could not be saved")]
    Persist(#[source] anyhow::Error),
    /// Transport or service failure from a collaborator, propagated as-is
    #[error(transparent)]
    Service(anyhow::Error),
}

/// The in-memory edit state of one listing.
///
/// `address` is the editable form of the stored `location`; `images` holds
/// files selected in the form but not yet uploaded. Both are stripped before
/// the record is persisted.
#[derive(Debug, Clone)]
pub struct Draft {
    pub kind: ListingKind,
    pub name: String,
    pub bedrooms: u8,
    pub bathrooms: u8,
    pub parking: bool,
    pub furnished: bool,
    pub offer: bool,
    pub regular_price: u32,
    pub discounted_price: u32,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub images: Vec<ImageBlob>,
}

impl Default for Draft {
    fn default() -> Self {
        Self {
            kind: ListingKind::Rent,
            name: String::new(),
            bedrooms: 1,
            bathrooms: 1,
            parking: false,
            furnished: false,
            offer: false,
            regular_price: 0,
            discounted_price: 0,
            address: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            images: Vec::new(),
        }
    }
}

/// Form fields the editor accepts input for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Kind,
    Name,
    Bedrooms,
    Bathrooms,
    Parking,
    Furnished,
    Address,
    Offer,
    RegularPrice,
    DiscountedPrice,
    Latitude,
    Longitude,
    Images,
}

/// Raw input from a form control: either text or a file selection
#[derive(Debug, Clone)]
pub enum FieldInput {
    Text(String),
    Files(Vec<ImageBlob>),
}

/// Where the caller should navigate after a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedListing {
    pub kind: ListingKind,
    pub id: String,
}

impl SavedListing {
    pub fn category_path(&self) -> String {
        format!("/category/{}/{}", self.kind.as_str(), self.id)
    }
}

/// Edit workflow for a single listing: load, mutate, submit.
pub struct ListingEditor {
    store: Arc<dyn ListingStore>,
    images: Arc<dyn ImageStore>,
    geocoder: Arc<dyn Geocoder>,
    listing_id: String,
    actor_id: String,
    /// Owner of the loaded record; carried through unchanged on save
    user_ref: String,
    /// When false, the form's explicit latitude/longitude are trusted as-is
    pub geolocation_enabled: bool,
    pub draft: Draft,
}

impl ListingEditor {
    /// Fetch the listing and populate the draft.
    ///
    /// Fails with [`EditorError::NotFound`] when no document exists for
    /// `listing_id`, and with [`EditorError::Forbidden`] when the record is
    /// owned by someone other than `actor_id`. In both cases no draft state
    /// is produced.
    pub async fn load(
        store: Arc<dyn ListingStore>,
        images: Arc<dyn ImageStore>,
        geocoder: Arc<dyn Geocoder>,
        listing_id: &str,
        actor_id: &str,
    ) -> Result<Self, EditorError> {
        let listing = store
            .get(listing_id)
            .await
            .map_err(EditorError::Service)?
            .ok_or(EditorError::NotFound)?;

        if listing.user_ref != actor_id {
            return Err(EditorError::Forbidden);
        }

        // The stored display location becomes the editable address field.
        let draft = Draft {
            kind: listing.kind,
            name: listing.name.clone(),
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            parking: listing.parking,
            furnished: listing.furnished,
            offer: listing.offer,
            regular_price: listing.regular_price,
            discounted_price: listing.discounted_price.unwrap_or(0),
            address: listing.location.clone(),
            latitude: listing.geolocation.lat,
            longitude: listing.geolocation.lng,
            images: Vec::new(),
        };

        info!("Loaded listing {} for editing", listing_id);
        Ok(Self {
            store,
            images,
            geocoder,
            listing_id: listing_id.to_string(),
            actor_id: actor_id.to_string(),
            user_ref: listing.user_ref,
            geolocation_enabled: false,
            draft,
        })
    }

    /// Apply one form-control change to the draft. Pure state transition;
    /// safe to call on every input event.
    ///
    /// Coercion rules: the literals `"true"`/`"false"` become booleans for
    /// the boolean fields; numeric fields parse from text; a file selection
    /// replaces the pending image set wholesale.
    pub fn mutate(&mut self, field: Field, input: FieldInput) -> anyhow::Result<()> {
        match input {
            FieldInput::Files(blobs) => {
                if field != Field::Images {
                    bail!("Only the images field accepts files");
                }
                self.draft.images = blobs;
            }
            FieldInput::Text(text) => match field {
                Field::Kind => {
                    self.draft.kind = match text.as_str() {
                        "sale" => ListingKind::Sale,
                        "rent" => ListingKind::Rent,
                        other => bail!("Listing type accepts sale/rent, got '{}'", other),
                    };
                }
                Field::Name => {
                    if text.chars().count() < NAME_MIN_LEN || text.chars().count() > NAME_MAX_LEN {
                        bail!(
                            "Name must be {}-{} characters, got {}",
                            NAME_MIN_LEN,
                            NAME_MAX_LEN,
                            text.chars().count()
                        );
                    }
                    self.draft.name = text;
                }
                Field::Address => self.draft.address = text,
                Field::Parking => self.draft.parking = parse_bool(&text)?,
                Field::Furnished => self.draft.furnished = parse_bool(&text)?,
                Field::Offer => self.draft.offer = parse_bool(&text)?,
                Field::Bedrooms => {
                    self.draft.bedrooms = parse_ranged(&text, "bedrooms", ROOMS_MIN, ROOMS_MAX)?
                }
                Field::Bathrooms => {
                    self.draft.bathrooms = parse_ranged(&text, "bathrooms", ROOMS_MIN, ROOMS_MAX)?
                }
                Field::RegularPrice => {
                    self.draft.regular_price =
                        parse_ranged(&text, "regular price", PRICE_MIN, PRICE_MAX)?
                }
                Field::DiscountedPrice => {
                    self.draft.discounted_price =
                        parse_ranged(&text, "discounted price", PRICE_MIN, PRICE_MAX)?
                }
                Field::Latitude => self.draft.latitude = parse_number(&text, "latitude")?,
                Field::Longitude => self.draft.longitude = parse_number(&text, "longitude")?,
                Field::Images => bail!("The images field accepts files, not text"),
            },
        }
        Ok(())
    }

    /// Validate the draft, resolve its location, upload pending images and
    /// persist the merged record. Fails fast: nothing is uploaded before
    /// validation passes and nothing is persisted before every upload
    /// succeeds.
    pub async fn submit(&self) -> Result<SavedListing, EditorError> {
        info!("Validating draft for listing {}", self.listing_id);

        if self.draft.offer && self.draft.discounted_price >= self.draft.regular_price {
            return Err(EditorError::Validation(
                ValidationFault::DiscountNotBelowRegular,
            ));
        }
        if self.draft.images.len() > MAX_IMAGES {
            return Err(EditorError::Validation(ValidationFault::TooManyImages));
        }

        let (geolocation, location) = self.resolve_location().await?;
        let img_urls = self.upload_images().await?;

        let listing = Listing {
            kind: self.draft.kind,
            name: self.draft.name.clone(),
            bedrooms: self.draft.bedrooms,
            bathrooms: self.draft.bathrooms,
            parking: self.draft.parking,
            furnished: self.draft.furnished,
            offer: self.draft.offer,
            regular_price: self.draft.regular_price,
            discounted_price: self
                .draft
                .offer
                .then_some(self.draft.discounted_price),
            location,
            geolocation,
            img_urls,
            user_ref: self.user_ref.clone(),
            timestamp: Utc::now(),
        };

        info!("Persisting listing {}", self.listing_id);
        self.store
            .update(&self.listing_id, &listing)
            .await
            .map_err(EditorError::Persist)?;

        info!("Listing {} saved", self.listing_id);
        Ok(SavedListing {
            kind: listing.kind,
            id: self.listing_id.clone(),
        })
    }

    async fn resolve_location(&self) -> Result<(GeoPoint, String), EditorError> {
        if !self.geolocation_enabled {
            // Explicit coordinates are trusted without bounds checking, and
            // the address text is used verbatim as the display location.
            return Ok((
                GeoPoint {
                    lat: self.draft.latitude,
                    lng: self.draft.longitude,
                },
                self.draft.address.clone(),
            ));
        }

        info!("Resolving address through geocoder");
        let hit = self
            .geocoder
            .resolve(&self.draft.address)
            .await
            .map_err(EditorError::Service)?
            .ok_or(EditorError::Validation(ValidationFault::BadAddress))?;

        // Legacy records have produced formatted addresses carrying the
        // literal token "undefined"; treat those as unresolved.
        if hit.formatted.contains("undefined") {
            return Err(EditorError::Validation(ValidationFault::BadAddress));
        }

        Ok((
            GeoPoint {
                lat: hit.lat,
                lng: hit.lng,
            },
            hit.formatted,
        ))
    }

    /// Upload every pending image concurrently. Result URLs keep the
    /// selection order, so the first file chosen stays the cover image no
    /// matter which upload finishes first. The first failure drops the
    /// in-flight siblings and fails the batch.
    async fn upload_images(&self) -> Result<Vec<String>, EditorError> {
        let total = self.draft.images.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        info!("Uploading {} images", total);
        let finished = AtomicUsize::new(0);
        let finished = &finished;

        let uploads = self.draft.images.iter().map(|blob| {
            // Distinct key per upload: owner, original filename, fresh token.
            let key = format!("{}-{}-{}", self.actor_id, blob.file_name, Uuid::new_v4());
            async move {
                let url = self.images.upload(&key, blob).await?;
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Upload progress: {:.0}%", done as f64 / total as f64 * 100.0);
                Ok::<String, anyhow::Error>(url)
            }
        });

        try_join_all(uploads).await.map_err(EditorError::Upload)
    }
}

fn parse_bool(text: &str) -> anyhow::Result<bool> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        other => bail!("Expected true/false, got '{}'", other),
    }
}

fn parse_number<T: std::str::FromStr>(text: &str, field: &str) -> anyhow::Result<T> {
    text.parse()
        .map_err(|_| anyhow::anyhow!("Invalid {}: '{}'", field, text))
}

/// Numeric field with the form's min/max bounds
fn parse_ranged<T>(text: &str, field: &str, min: T, max: T) -> anyhow::Result<T>
where
    T: std::str::FromStr + PartialOrd + fmt::Display,
{
    let value: T = parse_number(text, field)?;
    if value < min || value > max {
        bail!("{} must be between {} and {}", field, min, max);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::traits::ResolvedAddress;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    fn blob(file_name: &str) -> ImageBlob {
        ImageBlob {
            file_name: file_name.to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![0xff, 0xd8],
        }
    }

    fn stored_listing(owner: &str) -> Listing {
        Listing {
            kind: ListingKind::Rent,
            name: "Lakeside Cabin".to_string(),
            bedrooms: 2,
            bathrooms: 1,
            parking: false,
            furnished: false,
            offer: false,
            regular_price: 1200,
            discounted_price: None,
            location: "12 Shore Rd".to_string(),
            geolocation: GeoPoint { lat: 40.0, lng: -75.0 },
            img_urls: vec![],
            user_ref: owner.to_string(),
            timestamp: Utc::now(),
        }
    }

    // -- recording mocks ----------------------------------------------------

    struct MockStore {
        listing: Option<Listing>,
        updates: Mutex<Vec<(String, Listing)>>,
        fail_update: bool,
    }

    impl MockStore {
        fn with_listing(listing: Listing) -> Self {
            Self {
                listing: Some(listing),
                updates: Mutex::new(Vec::new()),
                fail_update: false,
            }
        }

        fn empty() -> Self {
            Self {
                listing: None,
                updates: Mutex::new(Vec::new()),
                fail_update: false,
            }
        }

        fn updates(&self) -> Vec<(String, Listing)> {
            self.updates.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ListingStore for MockStore {
        async fn get(&self, _id: &str) -> Result<Option<Listing>> {
            Ok(self.listing.clone())
        }

        async fn update(&self, id: &str, listing: &Listing) -> Result<()> {
            if self.fail_update {
                return Err(anyhow!("update rejected"));
            }
            self.updates
                .lock()
                .unwrap()
                .push((id.to_string(), listing.clone()));
            Ok(())
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<(String, Listing)>> {
            Ok(Vec::new())
        }
    }

    struct MockImages {
        /// Completion latency per original file name, to force arbitrary
        /// completion interleavings
        delays_ms: HashMap<String, u64>,
        fail_on: Option<String>,
        keys: Mutex<Vec<String>>,
    }

    impl MockImages {
        fn new() -> Self {
            Self {
                delays_ms: HashMap::new(),
                fail_on: None,
                keys: Mutex::new(Vec::new()),
            }
        }

        fn keys(&self) -> Vec<String> {
            self.keys.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImageStore for MockImages {
        async fn upload(&self, key: &str, blob: &ImageBlob) -> Result<String> {
            self.keys.lock().unwrap().push(key.to_string());
            if let Some(delay) = self.delays_ms.get(&blob.file_name) {
                tokio::time::sleep(Duration::from_millis(*delay)).await;
            }
            if self.fail_on.as_deref() == Some(blob.file_name.as_str()) {
                return Err(anyhow!("transfer failed"));
            }
            Ok(format!("https://cdn.test/{}", blob.file_name))
        }
    }

    struct MockGeocoder {
        hit: Option<ResolvedAddress>,
        calls: Mutex<Vec<String>>,
    }

    impl MockGeocoder {
        fn zero_results() -> Self {
            Self {
                hit: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_hit(hit: ResolvedAddress) -> Self {
            Self {
                hit: Some(hit),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Geocoder for MockGeocoder {
        async fn resolve(&self, address: &str) -> Result<Option<ResolvedAddress>> {
            self.calls.lock().unwrap().push(address.to_string());
            Ok(self.hit.clone())
        }
    }

    async fn editor_for(
        store: Arc<MockStore>,
        images: Arc<MockImages>,
        geocoder: Arc<MockGeocoder>,
    ) -> ListingEditor {
        ListingEditor::load(store, images, geocoder, "listing-1", "user-1")
            .await
            .expect("load should succeed")
    }

    // -- load ---------------------------------------------------------------

    #[tokio::test]
    async fn load_rejects_missing_listing() {
        let result = ListingEditor::load(
            Arc::new(MockStore::empty()),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
            "listing-1",
            "user-1",
        )
        .await;
        assert!(matches!(result, Err(EditorError::NotFound)));
    }

    #[tokio::test]
    async fn load_rejects_foreign_listing() {
        let result = ListingEditor::load(
            Arc::new(MockStore::with_listing(stored_listing("someone-else"))),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
            "listing-1",
            "user-1",
        )
        .await;
        assert!(matches!(result, Err(EditorError::Forbidden)));
    }

    #[tokio::test]
    async fn load_maps_stored_location_into_address() {
        let editor = editor_for(
            Arc::new(MockStore::with_listing(stored_listing("user-1"))),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;
        assert_eq!(editor.draft.address, "12 Shore Rd");
        assert_eq!(editor.draft.regular_price, 1200);
        assert!(editor.draft.images.is_empty());
    }

    // -- mutate -------------------------------------------------------------

    #[tokio::test]
    async fn mutate_coerces_boolean_literals() {
        let mut editor = editor_for(
            Arc::new(MockStore::with_listing(stored_listing("user-1"))),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;

        editor
            .mutate(Field::Parking, FieldInput::Text("true".to_string()))
            .unwrap();
        assert!(editor.draft.parking);

        editor
            .mutate(Field::Parking, FieldInput::Text("false".to_string()))
            .unwrap();
        assert!(!editor.draft.parking);

        let err = editor.mutate(Field::Parking, FieldInput::Text("yes".to_string()));
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn mutate_replaces_pending_images_wholesale() {
        let mut editor = editor_for(
            Arc::new(MockStore::with_listing(stored_listing("user-1"))),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;

        editor
            .mutate(Field::Images, FieldInput::Files(vec![blob("a.jpg"), blob("b.jpg")]))
            .unwrap();
        editor
            .mutate(Field::Images, FieldInput::Files(vec![blob("c.jpg")]))
            .unwrap();

        let names: Vec<&str> = editor
            .draft
            .images
            .iter()
            .map(|b| b.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["c.jpg"]);
    }

    #[tokio::test]
    async fn mutate_parses_numeric_fields() {
        let mut editor = editor_for(
            Arc::new(MockStore::with_listing(stored_listing("user-1"))),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;

        editor
            .mutate(Field::RegularPrice, FieldInput::Text("2500".to_string()))
            .unwrap();
        editor
            .mutate(Field::Latitude, FieldInput::Text("59.31".to_string()))
            .unwrap();
        assert_eq!(editor.draft.regular_price, 2500);
        assert_eq!(editor.draft.latitude, 59.31);

        assert!(editor
            .mutate(Field::Bedrooms, FieldInput::Text("many".to_string()))
            .is_err());
        assert!(editor
            .mutate(Field::Name, FieldInput::Files(vec![blob("a.jpg")]))
            .is_err());
    }

    #[tokio::test]
    async fn mutate_enforces_form_bounds() {
        let mut editor = editor_for(
            Arc::new(MockStore::with_listing(stored_listing("user-1"))),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;

        assert!(editor
            .mutate(Field::Bedrooms, FieldInput::Text("51".to_string()))
            .is_err());
        assert!(editor
            .mutate(Field::RegularPrice, FieldInput::Text("49".to_string()))
            .is_err());
        assert!(editor
            .mutate(Field::Name, FieldInput::Text("Too short".to_string()))
            .is_err());
        editor
            .mutate(Field::Name, FieldInput::Text("Lakeside Cabin".to_string()))
            .unwrap();
        assert_eq!(editor.draft.name, "Lakeside Cabin");
    }

    // -- submit: validation fails before any collaborator call ---------------

    #[tokio::test]
    async fn rejects_discount_not_below_regular_before_any_call() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let images = Arc::new(MockImages::new());
        let geocoder = Arc::new(MockGeocoder::with_hit(ResolvedAddress {
            lat: 1.0,
            lng: 2.0,
            formatted: "Somewhere".to_string(),
        }));

        let mut editor = editor_for(store.clone(), images.clone(), geocoder.clone()).await;
        editor.geolocation_enabled = true;
        editor.draft.offer = true;
        editor.draft.regular_price = 1200;
        editor.draft.discounted_price = 1200;
        editor.draft.images = vec![blob("a.jpg")];

        let err = editor.submit().await.unwrap_err();
        assert!(matches!(
            err,
            EditorError::Validation(ValidationFault::DiscountNotBelowRegular)
        ));
        assert!(geocoder.calls().is_empty());
        assert!(images.keys().is_empty());
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn rejects_more_than_six_images_before_any_call() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let images = Arc::new(MockImages::new());
        let geocoder = Arc::new(MockGeocoder::zero_results());

        let mut editor = editor_for(store.clone(), images.clone(), geocoder.clone()).await;
        editor.draft.images = (0..7).map(|i| blob(&format!("{}.jpg", i))).collect();

        let err = editor.submit().await.unwrap_err();
        assert!(matches!(
            err,
            EditorError::Validation(ValidationFault::TooManyImages)
        ));
        assert!(geocoder.calls().is_empty());
        assert!(images.keys().is_empty());
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn zero_geocode_results_abort_before_upload() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let images = Arc::new(MockImages::new());
        let geocoder = Arc::new(MockGeocoder::zero_results());

        let mut editor = editor_for(store.clone(), images.clone(), geocoder.clone()).await;
        editor.geolocation_enabled = true;
        editor.draft.images = vec![blob("a.jpg")];

        let err = editor.submit().await.unwrap_err();
        assert!(matches!(
            err,
            EditorError::Validation(ValidationFault::BadAddress)
        ));
        assert_eq!(geocoder.calls(), vec!["12 Shore Rd".to_string()]);
        assert!(images.keys().is_empty());
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn undefined_token_in_formatted_address_is_rejected() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let images = Arc::new(MockImages::new());
        let geocoder = Arc::new(MockGeocoder::with_hit(ResolvedAddress {
            lat: 1.0,
            lng: 2.0,
            formatted: "undefined, Springfield".to_string(),
        }));

        let mut editor = editor_for(store.clone(), images.clone(), geocoder).await;
        editor.geolocation_enabled = true;

        let err = editor.submit().await.unwrap_err();
        assert!(matches!(
            err,
            EditorError::Validation(ValidationFault::BadAddress)
        ));
        assert!(images.keys().is_empty());
        assert!(store.updates().is_empty());
    }

    // -- submit: uploads ------------------------------------------------------

    #[tokio::test]
    async fn upload_order_matches_selection_for_every_interleaving() {
        // Three images, every permutation of completion latencies.
        let latencies: [[u64; 3]; 6] = [
            [0, 20, 40],
            [0, 40, 20],
            [20, 0, 40],
            [20, 40, 0],
            [40, 0, 20],
            [40, 20, 0],
        ];

        for delays in latencies {
            let mut images = MockImages::new();
            for (name, delay) in ["a.jpg", "b.jpg", "c.jpg"].iter().zip(delays) {
                images.delays_ms.insert(name.to_string(), delay);
            }
            let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));

            let mut editor = editor_for(
                store.clone(),
                Arc::new(images),
                Arc::new(MockGeocoder::zero_results()),
            )
            .await;
            editor.draft.images = vec![blob("a.jpg"), blob("b.jpg"), blob("c.jpg")];

            editor.submit().await.unwrap();

            let (_, persisted) = store.updates().pop().unwrap();
            assert_eq!(
                persisted.img_urls,
                vec![
                    "https://cdn.test/a.jpg",
                    "https://cdn.test/b.jpg",
                    "https://cdn.test/c.jpg",
                ],
                "latency pattern {:?} reordered the cover image",
                delays
            );
        }
    }

    #[tokio::test]
    async fn upload_keys_carry_owner_filename_and_fresh_token() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let images = Arc::new(MockImages::new());

        let mut editor = editor_for(
            store,
            images.clone(),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;
        editor.draft.images = vec![blob("front.jpg"), blob("front.jpg")];

        editor.submit().await.unwrap();

        let keys = images.keys();
        assert_eq!(keys.len(), 2);
        for key in &keys {
            assert!(key.starts_with("user-1-front.jpg-"));
        }
        // Same owner and filename still get distinct keys.
        assert_ne!(keys[0], keys[1]);
    }

    #[tokio::test]
    async fn one_failed_upload_fails_the_batch_and_persists_nothing() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let mut images = MockImages::new();
        images.fail_on = Some("b.jpg".to_string());

        let mut editor = editor_for(
            store.clone(),
            Arc::new(images),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;
        editor.draft.images = vec![blob("a.jpg"), blob("b.jpg"), blob("c.jpg")];

        let err = editor.submit().await.unwrap_err();
        assert!(matches!(err, EditorError::Upload(_)));
        assert!(store.updates().is_empty());
    }

    // -- submit: persistence ---------------------------------------------------

    #[tokio::test]
    async fn rent_scenario_persists_the_expected_document() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let geocoder = Arc::new(MockGeocoder::zero_results());

        let mut editor = editor_for(store.clone(), Arc::new(MockImages::new()), geocoder).await;
        editor.draft = Draft {
            kind: ListingKind::Rent,
            name: "Lakeside Cabin".to_string(),
            bedrooms: 2,
            bathrooms: 1,
            regular_price: 1200,
            offer: false,
            latitude: 40.0,
            longitude: -75.0,
            address: "12 Shore Rd".to_string(),
            images: vec![blob("a.jpg"), blob("b.jpg")],
            ..Draft::default()
        };

        let saved = editor.submit().await.unwrap();
        assert_eq!(saved.kind, ListingKind::Rent);
        assert_eq!(saved.category_path(), "/category/rent/listing-1");

        let (id, persisted) = store.updates().pop().unwrap();
        assert_eq!(id, "listing-1");
        assert_eq!(
            persisted.img_urls,
            vec!["https://cdn.test/a.jpg", "https://cdn.test/b.jpg"]
        );
        assert_eq!(persisted.geolocation, GeoPoint { lat: 40.0, lng: -75.0 });
        assert_eq!(persisted.location, "12 Shore Rd");
        assert_eq!(persisted.user_ref, "user-1");

        // No offer means no discountedPrice key in the stored document.
        let doc = serde_json::to_value(&persisted).unwrap();
        assert!(doc.get("discountedPrice").is_none());
    }

    #[tokio::test]
    async fn geocoded_submission_adopts_canonical_address() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let geocoder = Arc::new(MockGeocoder::with_hit(ResolvedAddress {
            lat: 42.1,
            lng: -72.59,
            formatted: "12 Shore Rd, Springfield, MA, USA".to_string(),
        }));

        let mut editor = editor_for(store.clone(), Arc::new(MockImages::new()), geocoder).await;
        editor.geolocation_enabled = true;
        // Stale manual coordinates must be ignored in this branch.
        editor.draft.latitude = 0.0;
        editor.draft.longitude = 0.0;

        editor.submit().await.unwrap();

        let (_, persisted) = store.updates().pop().unwrap();
        assert_eq!(persisted.location, "12 Shore Rd, Springfield, MA, USA");
        assert_eq!(persisted.geolocation, GeoPoint { lat: 42.1, lng: -72.59 });
    }

    #[tokio::test]
    async fn rejected_update_surfaces_as_persist_error() {
        let mut store = MockStore::with_listing(stored_listing("user-1"));
        store.fail_update = true;

        let editor = editor_for(
            Arc::new(store),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;

        let err = editor.submit().await.unwrap_err();
        assert!(matches!(err, EditorError::Persist(_)));
    }

    #[tokio::test]
    async fn draft_stays_editable_after_a_failed_submission() {
        let store = Arc::new(MockStore::with_listing(stored_listing("user-1")));
        let mut editor = editor_for(
            store.clone(),
            Arc::new(MockImages::new()),
            Arc::new(MockGeocoder::zero_results()),
        )
        .await;

        editor.draft.offer = true;
        editor.draft.regular_price = 1000;
        editor.draft.discounted_price = 1000;
        assert!(editor.submit().await.is_err());

        // Fix the draft and resubmit.
        editor
            .mutate(Field::DiscountedPrice, FieldInput::Text("900".to_string()))
            .unwrap();
        let saved = editor.submit().await.unwrap();
        assert_eq!(saved.id, "listing-1");

        let (_, persisted) = store.updates().pop().unwrap();
        assert_eq!(persisted.discounted_price, Some(900));
    }
}
