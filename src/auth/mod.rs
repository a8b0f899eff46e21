//! Bearer token authorization
//!
//! Every route names the [`Scope`] it needs. [`authorize`] pulls the bearer
//! token off the request, asks the configured [`TokenIntrospector`] about it
//! and either returns the [`Authorized`] caller or fails with 401/403/503.

pub mod config;
pub mod hydra;
pub mod static_tokens;

use crate::error::CatalogError;
use actix_web::http::header;
use actix_web::HttpRequest;
use chrono::Utc;
use futures::future::BoxFuture;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Permission a route requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    ProductRead,
    ProductAdmin,
    DatasetRead,
    DatasetAdmin,
    ResourceRead,
    ResourceAdmin,
    SimulationRead,
    SimulationAdmin,
}

impl Scope {
    pub const ALL: [Scope; 8] = [
        Scope::ProductRead,
        Scope::ProductAdmin,
        Scope::DatasetRead,
        Scope::DatasetAdmin,
        Scope::ResourceRead,
        Scope::ResourceAdmin,
        Scope::SimulationRead,
        Scope::SimulationAdmin,
    ];

    /// Scope string as granted by the identity provider
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::ProductRead => "catalog.product:read",
            Scope::ProductAdmin => "catalog.product:admin",
            Scope::DatasetRead => "catalog.dataset:read",
            Scope::DatasetAdmin => "catalog.dataset:admin",
            Scope::ResourceRead => "catalog.resource:read",
            Scope::ResourceAdmin => "catalog.resource:admin",
            Scope::SimulationRead => "catalog.simulation:read",
            Scope::SimulationAdmin => "catalog.simulation:admin",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| format!("Unknown scope: {}", s))
    }
}

/// Caller on whose behalf a request runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub client_id: String,
    /// None for machine clients acting on their own behalf
    pub user_id: Option<String>,
}

/// RFC 7662 introspection response, reduced to the fields used here
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenIntrospection {
    #[serde(default)]
    pub active: bool,
    /// Space-separated granted scopes
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    /// Expiry as seconds since the epoch
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenIntrospection {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scope
            .as_deref()
            .map(|granted| granted.split_whitespace().any(|s| s == scope.as_str()))
            .unwrap_or(false)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.exp, Some(exp) if exp <= now)
    }

    /// Authorized caller, if the token is live and carries `scope`
    pub fn grant(&self, scope: Scope, now: i64) -> Option<Authorized> {
        if !self.active || self.is_expired(now) || !self.has_scope(scope) {
            return None;
        }
        let client_id = self.client_id.clone()?;
        let user_id = self.sub.clone().filter(|sub| *sub != client_id);
        Some(Authorized { client_id, user_id })
    }
}

/// Source of truth for bearer tokens
pub trait TokenIntrospector: Send + Sync {
    /// Look up `token`, passing `scope` as the scope being requested
    fn introspect<'a>(&'a self, token: &'a str, scope: Scope) -> BoxFuture<'a, Result<TokenIntrospection, CatalogError>>;
}

/// Extract the bearer token from the Authorization header
pub fn bearer_token(req: &HttpRequest) -> Result<&str, CatalogError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(CatalogError::Unauthorized)?
        .to_str()
        .map_err(|_| CatalogError::Unauthorized)?;

    let (scheme, token) = value.trim().split_once(' ').ok_or(CatalogError::Unauthorized)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(CatalogError::Unauthorized);
    }
    Ok(token)
}

/// Check that the request carries a token granting `scope`
pub async fn authorize(
    req: &HttpRequest,
    introspector: &dyn TokenIntrospector,
    scope: Scope,
) -> Result<Authorized, CatalogError> {
    let token = bearer_token(req)?.to_string();
    let introspection = introspector.introspect(&token, scope).await?;

    match introspection.grant(scope, Utc::now().timestamp()) {
        Some(authorized) => {
            debug!("Client {} authorized for {}", authorized.client_id, scope);
            Ok(authorized)
        }
        None => {
            warn!(
                "Token rejected for {} (active: {}, client: {})",
                scope,
                introspection.active,
                introspection.client_id.as_deref().unwrap_or("-")
            );
            Err(CatalogError::Forbidden)
        }
    }
}
