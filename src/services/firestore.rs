use crate::models::{GeoPoint, Listing, ListingKind};
use crate::services::traits::ListingStore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";
const COLLECTION: &str = "listings";

/// Listing persistence against the Firestore REST API.
///
/// Documents are exchanged in Firestore's typed value encoding
/// (`stringValue`, `integerValue`, ...); the mapping to and from [`Listing`]
/// lives in this module so the rest of the app only sees the domain type.
pub struct FirestoreListings {
    client: Client,
    documents_url: String,
    api_key: String,
}

impl FirestoreListings {
    pub fn new(project_id: &str, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            FIRESTORE_BASE, project_id
        );

        Ok(Self {
            client,
            documents_url,
            api_key,
        })
    }

    fn doc_url(&self, id: &str) -> String {
        format!(
            "{}/{}/{}?key={}",
            self.documents_url, COLLECTION, id, self.api_key
        )
    }
}

#[async_trait]
impl ListingStore for FirestoreListings {
    async fn get(&self, id: &str) -> Result<Option<Listing>> {
        debug!("Fetching listing {}", id);

        let response = self
            .client
            .get(self.doc_url(id))
            .send()
            .await
            .context("Failed to fetch listing document")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Listing fetch failed with status {}: {}", status, body);
        }

        let doc: Value = response.json().await.context("Invalid document body")?;
        let fields = doc
            .get("fields")
            .context("Document response missing fields")?;
        listing_from_fields(fields).map(Some)
    }

    async fn update(&self, id: &str, listing: &Listing) -> Result<()> {
        debug!("Updating listing {}", id);

        let body = json!({ "fields": listing_to_fields(listing) });
        let response = self
            .client
            .patch(self.doc_url(id))
            .json(&body)
            .send()
            .await
            .context("Failed to update listing document")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Listing update failed with status {}: {}", status, body);
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<(String, Listing)>> {
        debug!("Querying {} most recent listings", limit);

        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": COLLECTION }],
                "orderBy": [{
                    "field": { "fieldPath": "timestamp" },
                    "direction": "DESCENDING"
                }],
                "limit": limit
            }
        });

        let url = format!("{}:runQuery?key={}", self.documents_url, self.api_key);
        let response = self
            .client
            .post(url)
            .json(&query)
            .send()
            .await
            .context("Failed to run recent-listings query")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Recent-listings query failed with status {}: {}", status, body);
        }

        // runQuery streams one JSON object per result; entries without a
        // `document` key carry only read metadata and are skipped.
        let rows: Vec<Value> = response.json().await.context("Invalid query response")?;
        let mut listings = Vec::new();
        for row in &rows {
            let Some(doc) = row.get("document") else {
                continue;
            };
            let name = doc
                .get("name")
                .and_then(Value::as_str)
                .context("Query result document missing name")?;
            let id = name
                .rsplit('/')
                .next()
                .context("Malformed document name")?
                .to_string();
            let fields = doc
                .get("fields")
                .context("Query result document missing fields")?;
            listings.push((id, listing_from_fields(fields)?));
        }
        Ok(listings)
    }
}

// ---------------------------------------------------------------------------
// Firestore value encoding
// ---------------------------------------------------------------------------

fn string_value(s: &str) -> Value {
    json!({ "stringValue": s })
}

// Firestore transports 64-bit integers as decimal strings.
fn integer_value(n: i64) -> Value {
    json!({ "integerValue": n.to_string() })
}

fn boolean_value(b: bool) -> Value {
    json!({ "booleanValue": b })
}

fn double_value(f: f64) -> Value {
    json!({ "doubleValue": f })
}

fn timestamp_value(t: &DateTime<Utc>) -> Value {
    json!({ "timestampValue": t.to_rfc3339() })
}

pub fn listing_to_fields(listing: &Listing) -> Value {
    let img_urls: Vec<Value> = listing
        .img_urls
        .iter()
        .map(|url| string_value(url))
        .collect();

    let mut fields = json!({
        "type": string_value(listing.kind.as_str()),
        "name": string_value(&listing.name),
        "bedrooms": integer_value(listing.bedrooms as i64),
        "bathrooms": integer_value(listing.bathrooms as i64),
        "parking": boolean_value(listing.parking),
        "furnished": boolean_value(listing.furnished),
        "offer": boolean_value(listing.offer),
        "regularPrice": integer_value(listing.regular_price as i64),
        "location": string_value(&listing.location),
        "geolocation": {
            "mapValue": {
                "fields": {
                    "lat": double_value(listing.geolocation.lat),
                    "lng": double_value(listing.geolocation.lng),
                }
            }
        },
        "imgUrls": { "arrayValue": { "values": img_urls } },
        "userRef": string_value(&listing.user_ref),
        "timestamp": timestamp_value(&listing.timestamp),
    });

    if let Some(discounted) = listing.discounted_price {
        fields["discountedPrice"] = integer_value(discounted as i64);
    }
    fields
}

fn field<'a>(fields: &'a Value, name: &str) -> Result<&'a Value> {
    fields
        .get(name)
        .with_context(|| format!("Document missing field '{}'", name))
}

fn read_string(fields: &Value, name: &str) -> Result<String> {
    field(fields, name)?
        .get("stringValue")
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("Field '{}' is not a string", name))
}

fn read_integer(fields: &Value, name: &str) -> Result<i64> {
    field(fields, name)?
        .get("integerValue")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .with_context(|| format!("Field '{}' is not an integer", name))
}

// Other clients can write any 64-bit integer; reject values the model
// cannot hold instead of truncating them.
fn read_u8(fields: &Value, name: &str) -> Result<u8> {
    u8::try_from(read_integer(fields, name)?)
        .with_context(|| format!("Field '{}' is out of range", name))
}

fn read_u32(fields: &Value, name: &str) -> Result<u32> {
    u32::try_from(read_integer(fields, name)?)
        .with_context(|| format!("Field '{}' is out of range", name))
}

fn read_boolean(fields: &Value, name: &str) -> Result<bool> {
    field(fields, name)?
        .get("booleanValue")
        .and_then(Value::as_bool)
        .with_context(|| format!("Field '{}' is not a boolean", name))
}

// Coordinates written by other clients sometimes arrive as integerValue
// (e.g. a whole-number latitude), so accept both encodings.
fn read_double(fields: &Value, name: &str) -> Result<f64> {
    let value = field(fields, name)?;
    if let Some(f) = value.get("doubleValue").and_then(Value::as_f64) {
        return Ok(f);
    }
    value
        .get("integerValue")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .with_context(|| format!("Field '{}' is not a number", name))
}

pub fn listing_from_fields(fields: &Value) -> Result<Listing> {
    let kind = match read_string(fields, "type")?.as_str() {
        "sale" => ListingKind::Sale,
        "rent" => ListingKind::Rent,
        other => bail!("Unknown listing type '{}'", other),
    };

    let geolocation = field(fields, "geolocation")?
        .pointer("/mapValue/fields")
        .context("Field 'geolocation' is not a map")?;

    let img_urls = field(fields, "imgUrls")?
        .pointer("/arrayValue/values")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.get("stringValue").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let discounted_price = match fields.get("discountedPrice") {
        Some(_) => Some(read_u32(fields, "discountedPrice")?),
        None => None,
    };

    let timestamp = read_string_at(fields, "timestamp", "timestampValue")?
        .parse::<DateTime<Utc>>()
        .context("Field 'timestamp' is not a valid timestamp")?;

    Ok(Listing {
        kind,
        name: read_string(fields, "name")?,
        bedrooms: read_u8(fields, "bedrooms")?,
        bathrooms: read_u8(fields, "bathrooms")?,
        parking: read_boolean(fields, "parking")?,
        furnished: read_boolean(fields, "furnished")?,
        offer: read_boolean(fields, "offer")?,
        regular_price: read_u32(fields, "regularPrice")?,
        discounted_price,
        location: read_string(fields, "location")?,
        geolocation: GeoPoint {
            lat: read_double(geolocation, "lat")?,
            lng: read_double(geolocation, "lng")?,
        },
        img_urls,
        user_ref: read_string(fields, "userRef")?,
        timestamp,
    })
}

fn read_string_at(fields: &Value, name: &str, value_key: &str) -> Result<String> {
    field(fields, name)?
        .get(value_key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("Field '{}' is not a {}", name, value_key))
}
