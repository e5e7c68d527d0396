use std::net::SocketAddr;

use crate::error::{CommerceError, Result};

/// Google OAuth client registered for Drive imports.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Supabase Storage bucket used for product media.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub supabase_url: String,
    pub service_key: String,
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct MedusaConfig {
    pub backend_url: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Hosts under which tenants are addressed by subdomain, e.g. `shoreline.shop`.
    pub platform_domains: Vec<String>,
    pub default_tenant_slug: Option<String>,
    pub master_admin_token: String,
    /// Base URL the payment gateways call back into.
    pub public_base_url: String,
    pub storage: Option<StorageConfig>,
    pub google: Option<GoogleConfig>,
    pub medusa: Option<MedusaConfig>,
    pub nats_url: Option<String>,
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| CommerceError::Config(format!("{key} must be set")))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| CommerceError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

/// Splits a comma separated list, dropping blanks and normalising case.
pub fn parse_domain_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

impl AppConfig {
    /// Reads configuration from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        let port = parsed("PORT", 8083u16)?;
        let public_base_url = optional("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        let storage = match (optional("SUPABASE_URL"), optional("SUPABASE_SERVICE_ROLE_KEY")) {
            (Some(url), Some(key)) => Some(StorageConfig {
                supabase_url: url.trim_end_matches('/').to_string(),
                service_key: key,
                bucket: optional("STORAGE_BUCKET").unwrap_or_else(|| "product-images".to_string()),
            }),
            _ => None,
        };

        let google = match (
            optional("GOOGLE_CLIENT_ID"),
            optional("GOOGLE_CLIENT_SECRET"),
        ) {
            (Some(client_id), Some(client_secret)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_uri: optional("GOOGLE_REDIRECT_URI").unwrap_or_else(|| {
                    format!("{public_base_url}/api/v1/integrations/google/callback")
                }),
            }),
            _ => None,
        };

        let medusa = optional("MEDUSA_BACKEND_URL").map(|backend_url| MedusaConfig {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            admin_email: optional("MEDUSA_ADMIN_EMAIL").unwrap_or_default(),
            admin_password: optional("MEDUSA_ADMIN_PASSWORD").unwrap_or_default(),
        });

        Ok(Self {
            host: optional("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10u32)?,
            platform_domains: parse_domain_list(
                &optional("PLATFORM_DOMAINS").unwrap_or_else(|| "localhost".to_string()),
            ),
            default_tenant_slug: optional("DEFAULT_TENANT_SLUG"),
            master_admin_token: required("MASTER_ADMIN_TOKEN")?,
            public_base_url,
            storage,
            google,
            medusa,
            nats_url: optional("NATS_URL"),
        })
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Minimal configuration for embedding the router without a process environment.
    pub fn for_tests(master_admin_token: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url: String::new(),
            database_max_connections: 1,
            platform_domains: vec!["localhost".to_string(), "shoreline.shop".to_string()],
            default_tenant_slug: None,
            master_admin_token: master_admin_token.into(),
            public_base_url: "http://localhost:8083".to_string(),
            storage: None,
            google: None,
            medusa: None,
            nats_url: None,
        }
    }
}
