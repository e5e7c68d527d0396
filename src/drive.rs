//! Google Drive integration: per-tenant OAuth and product image import
//!
//! Tokens live on the tenant row. Access tokens are reused while they have more
//! than a minute left and are otherwise refreshed with the stored refresh token.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::GoogleConfig;
use crate::domain::{DomainEvent, Tenant};
use crate::domain::events::ProductEvent;
use crate::error::{CommerceError, Result};
use crate::infra::storage::product_object_path;
use crate::infra::{publish_all, EventPublisher, ObjectStorage};
use crate::store::Store;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const PAGE_SIZE: u32 = 100;

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Google integration is not configured")]
    NotConfigured,

    #[error("Google Drive not connected")]
    NotConnected,

    #[error("Google request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Google API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("file {0} is not an image")]
    NotAnImage(String),
}

#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub drive_api: String,
    pub revoke_url: String,
}

impl Default for GoogleEndpoints {
    fn default() -> Self {
        Self {
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            drive_api: "https://www.googleapis.com/drive/v3".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
}

impl DriveFile {
    pub fn is_image(&self) -> bool { self.mime_type.starts_with("image/") }
    pub fn is_folder(&self) -> bool { self.mime_type == FOLDER_MIME }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportedFile {
    pub file_id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportFailure {
    pub file_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: Vec<ImportedFile>,
    pub errors: Vec<ImportFailure>,
    /// URLs uploaded but not attached because the product was already at its image limit.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_attached: Vec<String>,
}

/// Drive `files.list` query for images and sub-folders directly inside `folder_id`.
pub fn folder_query(folder_id: &str) -> String {
    let folder = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{folder}' in parents and trashed = false and (mimeType contains 'image/' or mimeType = '{FOLDER_MIME}')")
}

async fn check(response: reqwest::Response) -> std::result::Result<reqwest::Response, DriveError> {
    let status = response.status();
    if status.is_success() { return Ok(response); }
    let body = response.text().await.unwrap_or_default();
    Err(DriveError::Api { status: status.as_u16(), body })
}

pub struct GoogleDrive {
    http: reqwest::Client,
    config: Option<GoogleConfig>,
    endpoints: GoogleEndpoints,
    store: Arc<dyn Store>,
    storage: Arc<dyn ObjectStorage>,
    events: Arc<dyn EventPublisher>,
}

impl GoogleDrive {
    pub fn new(
        http: reqwest::Client,
        config: Option<GoogleConfig>,
        endpoints: GoogleEndpoints,
        store: Arc<dyn Store>,
        storage: Arc<dyn ObjectStorage>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { http, config, endpoints, store, storage, events }
    }

    fn config(&self) -> std::result::Result<&GoogleConfig, DriveError> {
        self.config.as_ref().ok_or(DriveError::NotConfigured)
    }

    /// Consent screen URL. The tenant id travels in `state` and comes back on the callback.
    pub fn authorize_url(&self, tenant_id: Uuid) -> Result<String> {
        let config = self.config()?;
        let state = tenant_id.to_string();
        let url = url::Url::parse_with_params(&self.endpoints.auth_url, &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state.as_str()),
        ])
        .map_err(|e| CommerceError::Config(format!("google auth url: {e}")))?;
        Ok(url.into())
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> std::result::Result<TokenResponse, DriveError> {
        let response = self.http.post(&self.endpoints.token_url).form(form).send().await?;
        Ok(check(response).await?.json().await?)
    }

    fn store_token(tenant: &mut Tenant, token: TokenResponse) {
        let now = Utc::now();
        tenant.google_access_token = Some(token.access_token);
        tenant.google_token_expires_at = Some(now + Duration::seconds(token.expires_in.unwrap_or(3600)));
        if let Some(refresh) = token.refresh_token {
            tenant.google_refresh_token = Some(refresh);
        }
        tenant.touch();
    }

    /// Completes the OAuth callback and persists the tokens on the tenant.
    pub async fn exchange_code(&self, tenant: &mut Tenant, code: &str) -> Result<()> {
        let config = self.config()?;
        let token = self.request_token(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
        ]).await?;
        Self::store_token(tenant, token);
        self.store.update_tenant(tenant).await?;
        tracing::info!(tenant = %tenant.id, refresh = tenant.google_connected(), "google drive connected");
        Ok(())
    }

    /// A usable access token, refreshed and persisted when the cached one is about to expire.
    pub async fn access_token(&self, tenant: &mut Tenant) -> Result<String> {
        if let Some(token) = tenant.cached_google_token(Utc::now()) {
            return Ok(token.to_string());
        }
        let refresh = tenant.google_refresh_token.clone().ok_or(DriveError::NotConnected)?;
        let config = self.config()?;
        let token = self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ]).await?;
        let access = token.access_token.clone();
        Self::store_token(tenant, token);
        self.store.update_tenant(tenant).await?;
        tracing::debug!(tenant = %tenant.id, "refreshed google access token");
        Ok(access)
    }

    pub async fn list_files(&self, tenant: &mut Tenant, folder_id: Option<&str>, page_token: Option<&str>) -> Result<DriveFileList> {
        let token = self.access_token(tenant).await?;
        let folder = folder_id
            .or(tenant.google_drive_folder_id.as_deref())
            .unwrap_or("root")
            .to_string();
        let mut query = vec![
            ("q", folder_query(&folder)),
            ("pageSize", PAGE_SIZE.to_string()),
            ("fields", "nextPageToken,files(id,name,mimeType,thumbnailLink,size,modifiedTime)".to_string()),
            ("orderBy", "folder,name".to_string()),
        ];
        if let Some(page) = page_token {
            query.push(("pageToken", page.to_string()));
        }
        let response = self.http
            .get(format!("{}/files", self.endpoints.drive_api))
            .bearer_auth(&token)
            .query(&query)
            .send()
            .await
            .map_err(DriveError::from)?;
        Ok(check(response).await?.json().await.map_err(DriveError::from)?)
    }

    async fn import_one(&self, token: &str, tenant_slug: &str, file_id: &str) -> Result<ImportedFile> {
        let meta = self.http
            .get(format!("{}/files/{}", self.endpoints.drive_api, urlencoding::encode(file_id)))
            .bearer_auth(token)
            .query(&[("fields", "id,name,mimeType")])
            .send()
            .await
            .map_err(DriveError::from)?;
        let file: DriveFile = check(meta).await?.json().await.map_err(DriveError::from)?;
        if !file.is_image() {
            return Err(DriveError::NotAnImage(file.name).into());
        }

        let media = self.http
            .get(format!("{}/files/{}", self.endpoints.drive_api, urlencoding::encode(file_id)))
            .bearer_auth(token)
            .query(&[("alt", "media")])
            .send()
            .await
            .map_err(DriveError::from)?;
        let data = check(media).await?.bytes().await.map_err(DriveError::from)?;

        let path = product_object_path(tenant_slug, &file.name, Utc::now());
        let url = self.storage.upload(&path, data, &file.mime_type).await?;
        Ok(ImportedFile { file_id: file.id, name: file.name, url })
    }

    /// Copies Drive images into object storage one by one. A failing file is
    /// reported in `errors` and the rest still run; nothing is rolled back.
    pub async fn import_files(&self, tenant: &mut Tenant, file_ids: &[String], product_id: Option<Uuid>) -> Result<ImportReport> {
        let mut product = match product_id {
            Some(id) => Some(self.store.get_product(tenant.id, id).await?.ok_or(CommerceError::NotFound("product"))?),
            None => None,
        };
        let token = self.access_token(tenant).await?;

        let mut report = ImportReport::default();
        for file_id in file_ids {
            match self.import_one(&token, &tenant.slug, file_id).await {
                Ok(imported) => report.imported.push(imported),
                Err(e) => {
                    tracing::warn!(tenant = %tenant.id, file_id = %file_id, error = %e, "drive import failed");
                    report.errors.push(ImportFailure { file_id: file_id.clone(), error: e.to_string() });
                }
            }
        }

        if let Some(product) = product.as_mut() {
            if !report.imported.is_empty() {
                let urls = report.imported.iter().map(|f| f.url.clone()).collect();
                report.not_attached = product.append_images(urls);
                self.store.update_product(product).await?;
                let event = DomainEvent::Product(ProductEvent::ImagesImported {
                    tenant_id: tenant.id,
                    product_id: product.id,
                    count: report.imported.len() - report.not_attached.len(),
                });
                publish_all(self.events.as_ref(), &tenant.slug, vec![event]).await;
            }
        }
        tracing::info!(
            tenant = %tenant.id, imported = report.imported.len(), failed = report.errors.len(), "drive import finished"
        );
        Ok(report)
    }

    /// Revokes the grant at Google (best effort) and forgets the stored tokens.
    pub async fn disconnect(&self, tenant: &mut Tenant) -> Result<()> {
        if let Some(token) = tenant.google_refresh_token.as_deref().or(tenant.google_access_token.as_deref()) {
            let revoked = self.http.post(&self.endpoints.revoke_url).form(&[("token", token)]).send().await;
            if let Err(e) = revoked {
                tracing::warn!(tenant = %tenant.id, error = %e, "google token revocation failed");
            }
        }
        tenant.google_refresh_token = None;
        tenant.google_access_token = None;
        tenant.google_token_expires_at = None;
        tenant.touch();
        self.store.update_tenant(tenant).await?;
        tracing::info!(tenant = %tenant.id, "google drive disconnected");
        Ok(())
    }
}
