//! Tenant resolution
//!
//! A request is mapped to a storefront in two steps. The [`tenant_headers`]
//! middleware inspects the host and rewrites the `x-tenant-subdomain` /
//! `x-tenant-domain` headers without touching the database. Handlers that need
//! the tenant then call [`lookup_tenant`], which reads those headers and hits the
//! store on every request.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::Tenant;
use crate::error::Result;
use crate::store::Store;

pub const TENANT_SUBDOMAIN_HEADER: &str = "x-tenant-subdomain";
pub const TENANT_DOMAIN_HEADER: &str = "x-tenant-domain";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostResolution {
    Localhost,
    /// The bare platform domain or its `www.` form.
    PlatformRoot,
    Subdomain(String),
    CustomDomain(String),
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') { Some(end) => &host[..=end], None => host };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn single_label(sub: &str) -> bool { !sub.is_empty() && !sub.contains('.') && sub != "www" }

pub fn resolve_host(host: &str, platform_domains: &[String]) -> HostResolution {
    let host = strip_port(host.trim()).to_ascii_lowercase();
    let host = host.trim_end_matches('.');

    if host.is_empty() || matches!(host, "localhost" | "127.0.0.1" | "[::1]") {
        return HostResolution::Localhost;
    }
    if let Some(sub) = host.strip_suffix(".localhost") {
        return if single_label(sub) { HostResolution::Subdomain(sub.to_string()) } else { HostResolution::Localhost };
    }
    for domain in platform_domains {
        if host == domain || host.strip_prefix("www.") == Some(domain.as_str()) {
            return HostResolution::PlatformRoot;
        }
        if let Some(sub) = host.strip_suffix(domain.as_str()).and_then(|s| s.strip_suffix('.')) {
            if single_label(sub) { return HostResolution::Subdomain(sub.to_string()); }
        }
    }
    HostResolution::CustomDomain(host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// `X-Forwarded-Host` (first entry) when present, otherwise `Host`.
pub fn request_host(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers.get("x-forwarded-host")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    forwarded
        .or_else(|| headers.get(axum::http::header::HOST).and_then(|v| v.to_str().ok()))
        .map(str::to_string)
}

/// Replaces any client-supplied tenant headers with ones derived from the host.
pub async fn tenant_headers(State(platform_domains): State<Arc<Vec<String>>>, mut req: Request, next: Next) -> Response {
    let host = request_host(req.headers()).unwrap_or_default();
    let resolution = resolve_host(&host, &platform_domains);

    let headers = req.headers_mut();
    headers.remove(TENANT_SUBDOMAIN_HEADER);
    headers.remove(TENANT_DOMAIN_HEADER);
    match &resolution {
        HostResolution::Subdomain(sub) => {
            if let Ok(v) = HeaderValue::from_str(sub) { headers.insert(TENANT_SUBDOMAIN_HEADER, v); }
        }
        HostResolution::CustomDomain(domain) => {
            if let Ok(v) = HeaderValue::from_str(domain) { headers.insert(TENANT_DOMAIN_HEADER, v); }
        }
        HostResolution::Localhost | HostResolution::PlatformRoot => {}
    }
    tracing::trace!(host = %host, resolution = ?resolution, "resolved tenant host");
    req.extensions_mut().insert(resolution);
    next.run(req).await
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty())
}

/// Loads the tenant named by the middleware headers. Inactive tenants count as missing.
///
/// Without either header the request came from localhost or the platform root and
/// falls back to `default_slug`, then to [`Tenant::local_default`].
pub async fn lookup_tenant(store: &dyn Store, headers: &HeaderMap, default_slug: Option<&str>) -> Result<Option<Tenant>> {
    if let Some(sub) = header(headers, TENANT_SUBDOMAIN_HEADER) {
        return Ok(store.find_tenant_by_subdomain(sub).await?.filter(|t| t.is_active));
    }
    if let Some(domain) = header(headers, TENANT_DOMAIN_HEADER) {
        return Ok(store.find_tenant_by_domain(domain).await?.filter(|t| t.is_active));
    }
    if let Some(slug) = default_slug {
        if let Some(tenant) = store.find_tenant_by_slug(slug).await?.filter(|t| t.is_active) {
            return Ok(Some(tenant));
        }
    }
    Ok(Some(Tenant::local_default()))
}
