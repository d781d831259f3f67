pub mod firestore;
pub mod geocode;
pub mod storage;
pub mod traits;

pub use firestore::FirestoreListings;
pub use geocode::GoogleGeocoder;
pub use storage::FirebaseImageStore;
pub use traits::{AuthContext, Geocoder, ImageStore, ListingStore, ResolvedAddress, SignedInUser};
