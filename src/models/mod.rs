use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a listing is offered for sale or for rent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Sale,
    Rent,
}

impl ListingKind {
    /// Path segment used in category links (`/category/{kind}/{id}`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Sale => "sale",
            ListingKind::Rent => "rent",
        }
    }
}

/// Latitude/longitude pair stored with a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Constraints enforced by the listing form
pub const NAME_MIN_LEN: usize = 10;
pub const NAME_MAX_LEN: usize = 32;
pub const ROOMS_MIN: u8 = 1;
pub const ROOMS_MAX: u8 = 50;
pub const PRICE_MIN: u32 = 50;
pub const PRICE_MAX: u32 = 750_000_000;
pub const MAX_IMAGES: usize = 6;

/// A listing document as stored in the hosted document database.
///
/// Field names mirror the stored document (`imgUrls`, `userRef`, ...).
/// `discounted_price` is only present while the listing has an active offer;
/// it is omitted from the serialized document otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    #[serde(rename = "type")]
    pub kind: ListingKind,
    pub name: String,
    pub bedrooms: u8,
    pub bathrooms: u8,
    pub parking: bool,
    pub furnished: bool,
    pub offer: bool,
    pub regular_price: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discounted_price: Option<u32>,
    /// Display address shown on cards and the detail page
    pub location: String,
    pub geolocation: GeoPoint,
    /// Ordered image URLs; the first entry is the cover image
    pub img_urls: Vec<String>,
    /// Identifier of the owning user; set at creation, never edited
    pub user_ref: String,
    pub timestamp: DateTime<Utc>,
}

impl Listing {
    /// Price a buyer actually pays: the discounted price while an offer is
    /// active, the regular price otherwise.
    pub fn effective_price(&self) -> u32 {
        if self.offer {
            self.discounted_price.unwrap_or(self.regular_price)
        } else {
            self.regular_price
        }
    }

    /// Cover image URL, if any image was uploaded
    pub fn cover_url(&self) -> Option<&str> {
        self.img_urls.first().map(String::as_str)
    }
}

/// An image selected in the form but not yet uploaded
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
