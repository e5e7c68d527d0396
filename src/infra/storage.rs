//! Object storage for product media (Supabase Storage REST API)

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::config::StorageConfig;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object storage is not configured")]
    NotConfigured,

    #[error("object storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("object storage rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `data` at `path`, replacing any existing object, and returns its public URL.
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<String, StorageError>;
    async fn delete(&self, paths: &[String]) -> Result<(), StorageError>;
    fn public_url(&self, path: &str) -> String;
}

/// Keeps letters, digits, dots, dashes and underscores; everything else becomes `-`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name.trim().chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() { "file".to_string() } else { cleaned }
}

/// `<tenant slug>/products/<unix millis>-<sanitised name>`
pub fn product_object_path(tenant_slug: &str, file_name: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{}/products/{}-{}", tenant_slug, now.timestamp_millis(), sanitize_file_name(file_name))
}

pub struct SupabaseStorage {
    http: reqwest::Client,
    config: StorageConfig,
}

impl SupabaseStorage {
    pub fn new(http: reqwest::Client, config: StorageConfig) -> Self { Self { http, config } }

    fn object_url(&self) -> String {
        format!("{}/storage/v1/object/{}", self.config.supabase_url, self.config.bucket)
    }

    async fn check(response: reqwest::Response) -> Result<(), StorageError> {
        let status = response.status();
        if status.is_success() { return Ok(()); }
        let body = response.text().await.unwrap_or_default();
        Err(StorageError::Rejected { status: status.as_u16(), body })
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<String, StorageError> {
        let response = self.http
            .post(format!("{}/{}", self.object_url(), path))
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .header("content-type", content_type)
            .header("x-upsert", "true")
            .body(data)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(self.public_url(path))
    }

    async fn delete(&self, paths: &[String]) -> Result<(), StorageError> {
        let response = self.http
            .delete(self.object_url())
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .json(&serde_json::json!({ "prefixes": paths }))
            .send()
            .await?;
        Self::check(response).await
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.config.supabase_url, self.config.bucket, path)
    }
}

/// Stand-in used when Supabase credentials are absent; every write fails.
pub struct DisabledStorage;

#[async_trait]
impl ObjectStorage for DisabledStorage {
    async fn upload(&self, _path: &str, _data: Bytes, _content_type: &str) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }

    async fn delete(&self, _paths: &[String]) -> Result<(), StorageError> { Err(StorageError::NotConfigured) }

    fn public_url(&self, path: &str) -> String { path.to_string() }
}
