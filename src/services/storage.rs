use crate::models::ImageBlob;
use crate::services::traits::ImageStore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const STORAGE_BASE: &str = "https://firebasestorage.googleapis.com/v0";

/// Image uploads against the Firebase Storage REST API.
///
/// Objects land under `images/{key}` in the configured bucket; the durable
/// URL is built from the stored object name and the download token returned
/// by the upload call.
pub struct FirebaseImageStore {
    client: Client,
    bucket: String,
    /// Bearer token of the signed-in user, when the bucket requires auth
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadedObject {
    name: String,
    #[serde(rename = "downloadTokens")]
    download_tokens: String,
}

impl FirebaseImageStore {
    pub fn new(bucket: String, id_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            bucket,
            id_token,
        })
    }

    fn download_url(&self, object_name: &str, token: &str) -> String {
        format!(
            "{}/b/{}/o/{}?alt=media&token={}",
            STORAGE_BASE,
            self.bucket,
            urlencoding::encode(object_name),
            token
        )
    }
}

#[async_trait]
impl ImageStore for FirebaseImageStore {
    async fn upload(&self, key: &str, blob: &ImageBlob) -> Result<String> {
        let object_name = format!("images/{}", key);
        debug!(
            "Uploading {} ({} bytes) as {}",
            blob.file_name,
            blob.bytes.len(),
            object_name
        );

        let url = format!(
            "{}/b/{}/o?name={}",
            STORAGE_BASE,
            self.bucket,
            urlencoding::encode(&object_name)
        );

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", blob.content_type.clone())
            .body(blob.bytes.clone());
        if let Some(token) = &self.id_token {
            request = request.header("Authorization", format!("Firebase {}", token));
        }

        let response = request.send().await.context("Failed to upload image")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Image upload failed with status {}: {}", status, body);
        }

        let uploaded: UploadedObject = response
            .json()
            .await
            .context("Invalid upload response body")?;
        let token = uploaded
            .download_tokens
            .split(',')
            .next()
            .context("Upload response carried no download token")?;

        Ok(self.download_url(&uploaded.name, token))
    }
}
