use anyhow::{Context, Result};
use std::env;

/// Connection settings for the hosted services, read from the environment
/// (a local `.env` file is honored).
#[derive(Debug, Clone)]
pub struct Config {
    pub firebase_project_id: String,
    pub firebase_api_key: String,
    pub storage_bucket: String,
    pub maps_api_key: String,
    /// Id of the signed-in user this session acts as
    pub user_id: String,
    /// Bearer token for storage uploads, when the bucket requires auth
    pub id_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            firebase_project_id: require("FIREBASE_PROJECT_ID")?,
            firebase_api_key: require("FIREBASE_API_KEY")?,
            storage_bucket: require("FIREBASE_STORAGE_BUCKET")?,
            maps_api_key: require("GOOGLE_MAPS_API_KEY")?,
            user_id: require("LISTING_USER_ID")?,
            id_token: env::var("FIREBASE_ID_TOKEN").ok(),
        })
    }
}

fn require(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("Missing required environment variable {}", key))
}
