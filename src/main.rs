mod config;
mod editor;
mod models;
mod services;
mod views;

use anyhow::Context;
use config::Config;
use editor::{Field, FieldInput, ListingEditor};
use models::ImageBlob;
use services::traits::{AuthContext, Geocoder, ImageStore, ListingStore};
use services::{FirebaseImageStore, FirestoreListings, GoogleGeocoder, SignedInUser};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, Level};
use views::{slides, ListingCard, ListingDetail};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("🏠 Listing Desk");
    info!("================");

    let config = Config::from_env()?;
    let auth = SignedInUser::new(config.user_id.clone());

    let store: Arc<dyn ListingStore> = Arc::new(FirestoreListings::new(
        &config.firebase_project_id,
        config.firebase_api_key.clone(),
    )?);
    let images: Arc<dyn ImageStore> = Arc::new(FirebaseImageStore::new(
        config.storage_bucket.clone(),
        config.id_token.clone(),
    )?);
    let geocoder: Arc<dyn Geocoder> = Arc::new(GoogleGeocoder::new(config.maps_api_key.clone())?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.split_first() {
        // listing-desk <listing-id> <image>... re-saves a listing with a
        // fresh image set, the way the edit form does.
        Some((listing_id, image_paths)) => {
            edit_listing(store, images, geocoder, &auth, listing_id, image_paths).await
        }
        // With no arguments, show the home-page data.
        None => show_recent(store, &auth).await,
    }
}

async fn show_recent(store: Arc<dyn ListingStore>, auth: &dyn AuthContext) -> anyhow::Result<()> {
    info!("Fetching recent listings...");
    let recent = store.recent(5).await?;
    info!("✅ Fetched {} listings\n", recent.len());

    for slide in slides(&recent) {
        println!("▸ {} ({})", slide.name, slide.price_label);
        println!("  {} -> {}", slide.cover_url, slide.link);
    }
    println!();

    let viewer = auth.current_user_id();
    for (i, (id, listing)) in recent.iter().enumerate() {
        let card = ListingCard::new(id, listing);
        println!("{}. {} ({})", i + 1, card.name, card.price_label);
        println!("   {}", card.location);
        println!("   {}, {}", card.bedrooms_label, card.bathrooms_label);
        println!("   Cover: {}", card.cover_url);
        println!("   ID: {}", card.id);
        println!("   Link: {}", card.link);

        let detail = ListingDetail::new(listing, viewer.as_deref());
        println!("   {}", detail.headline);
        println!("   {} · {}", detail.sale_or_rent, detail.features.join(" · "));
        if let Some(discount) = &detail.discount_label {
            println!("   {}", discount);
        }
        println!(
            "   Map ({}, {}): {}",
            detail.map_center.lat, detail.map_center.lng, detail.location
        );
        if detail.show_contact_owner {
            println!("   Contact Landlord");
        }
        println!();
    }

    Ok(())
}

async fn edit_listing(
    store: Arc<dyn ListingStore>,
    images: Arc<dyn ImageStore>,
    geocoder: Arc<dyn Geocoder>,
    auth: &dyn AuthContext,
    listing_id: &str,
    image_paths: &[String],
) -> anyhow::Result<()> {
    let actor_id = auth.current_user_id().context("Not signed in")?;

    // The edit form always replaces the image set, so at least one file is
    // required here too.
    anyhow::ensure!(
        !image_paths.is_empty(),
        "Provide at least one image file; the saved listing replaces its images"
    );

    let mut pending = Vec::with_capacity(image_paths.len());
    for path in image_paths {
        pending.push(read_image(path).await?);
    }

    let mut editor =
        ListingEditor::load(store, images, geocoder, listing_id, &actor_id).await?;
    info!("Editing '{}' at {}", editor.draft.name, editor.draft.address);

    editor.mutate(Field::Images, FieldInput::Files(pending))?;
    let saved = editor.submit().await?;

    println!("Listing saved! Now at {}", saved.category_path());
    Ok(())
}

async fn read_image(path: &str) -> anyhow::Result<ImageBlob> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path))?;

    let path = Path::new(path);
    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        _ => "image/jpeg",
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Image path has no file name")?
        .to_string();

    Ok(ImageBlob {
        file_name,
        content_type: content_type.to_string(),
        bytes,
    })
}
