use crate::models::{GeoPoint, Listing, ListingKind};

/// Shown on cards when a listing has no uploaded images
pub const PLACEHOLDER_IMAGE: &str = "/assets/placeholder-house.jpg";

/// Group a price into thousands: 1234567 -> "1,234,567"
pub fn group_thousands(amount: u32) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// Price as shown on cards: "$1,200 / Month" for rentals, "$450,000" for sales
pub fn price_label(listing: &Listing) -> String {
    let price = group_thousands(listing.effective_price());
    match listing.kind {
        ListingKind::Rent => format!("${} / Month", price),
        ListingKind::Sale => format!("${}", price),
    }
}

pub fn bedrooms_label(listing: &Listing) -> String {
    match listing.bedrooms {
        1 => "1 Bedroom".to_string(),
        n => format!("{} Bedrooms", n),
    }
}

// Must read the bathroom field; an earlier detail page rendered this from
// the bedroom count.
pub fn bathrooms_label(listing: &Listing) -> String {
    match listing.bathrooms {
        1 => "1 Bathroom".to_string(),
        n => format!("{} Bathrooms", n),
    }
}

/// One listing as rendered in a category or profile list
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCard {
    pub id: String,
    pub cover_url: String,
    pub name: String,
    pub location: String,
    pub price_label: String,
    pub bedrooms_label: String,
    pub bathrooms_label: String,
    /// Link target: `/category/{kind}/{id}`
    pub link: String,
}

impl ListingCard {
    pub fn new(id: &str, listing: &Listing) -> Self {
        Self {
            id: id.to_string(),
            cover_url: listing
                .cover_url()
                .unwrap_or(PLACEHOLDER_IMAGE)
                .to_string(),
            name: listing.name.clone(),
            location: listing.location.clone(),
            price_label: price_label(listing),
            bedrooms_label: bedrooms_label(listing),
            bathrooms_label: bathrooms_label(listing),
            link: format!("/category/{}/{}", listing.kind.as_str(), id),
        }
    }
}

/// The listing detail page, minus layout: headline, badges, feature list,
/// map marker, and whether to offer a contact-the-owner action.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDetail {
    pub headline: String,
    /// Display address; also the text of the map marker popup
    pub location: String,
    pub sale_or_rent: String,
    /// "$N discounted", only while an offer is active
    pub discount_label: Option<String>,
    pub features: Vec<String>,
    pub map_center: GeoPoint,
    /// Shown unless the viewer owns the listing
    pub show_contact_owner: bool,
}

impl ListingDetail {
    pub fn new(listing: &Listing, viewer_id: Option<&str>) -> Self {
        let headline = format!(
            "{} - ${}",
            listing.name,
            group_thousands(listing.effective_price())
        );

        // Stored documents can carry a discount at or above the regular
        // price (older merge-style saves left stale fields behind); show no
        // discount rather than underflow.
        let discount_label = listing
            .offer
            .then(|| {
                listing
                    .discounted_price
                    .and_then(|d| listing.regular_price.checked_sub(d))
                    .filter(|saved| *saved > 0)
                    .map(|saved| format!("${} discounted", group_thousands(saved)))
            })
            .flatten();

        let mut features = vec![bedrooms_label(listing), bathrooms_label(listing)];
        if listing.parking {
            features.push("Parking Spot".to_string());
        }
        if listing.furnished {
            features.push("Furnished".to_string());
        }

        Self {
            headline,
            location: listing.location.clone(),
            sale_or_rent: match listing.kind {
                ListingKind::Rent => "For Rent".to_string(),
                ListingKind::Sale => "For Sale".to_string(),
            },
            discount_label,
            features,
            map_center: listing.geolocation,
            show_contact_owner: viewer_id != Some(listing.user_ref.as_str()),
        }
    }
}

/// One slide of the home-page carousel of recent listings
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub name: String,
    pub cover_url: String,
    pub price_label: String,
    pub link: String,
}

/// Build carousel slides from the newest-first listings query.
pub fn slides(recent: &[(String, Listing)]) -> Vec<Slide> {
    recent
        .iter()
        .map(|(id, listing)| Slide {
            name: listing.name.clone(),
            cover_url: listing
                .cover_url()
                .unwrap_or(PLACEHOLDER_IMAGE)
                .to_string(),
            price_label: price_label(listing),
            link: format!("/category/{}/{}", listing.kind.as_str(), id),
        })
        .collect()
}
