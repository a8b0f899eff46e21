//! Token introspection against an ORY Hydra admin endpoint

use crate::auth::{Scope, TokenIntrospection, TokenIntrospector};
use crate::error::CatalogError;
use futures::future::BoxFuture;
use futures::FutureExt;
use log::{debug, error};
use std::time::Duration;

/// Introspects tokens with `POST {admin_url}/admin/oauth2/introspect`
pub struct HydraIntrospector {
    endpoint: String,
    http: reqwest::Client,
}

impl HydraIntrospector {
    pub fn new(admin_url: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Internal(format!("failed to initialize introspection client: {}", e)))?;

        Ok(Self {
            endpoint: format!("{}/admin/oauth2/introspect", admin_url.trim_end_matches('/')),
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, token: &str, scope: Scope) -> Result<TokenIntrospection, CatalogError> {
        debug!("Introspecting token for {} at {}", scope, self.endpoint);

        let body = serde_urlencoded::to_string([("token", token), ("scope", scope.as_str())])
            .map_err(|e| CatalogError::Internal(format!("failed to encode introspection form: {}", e)))?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("Introspection request failed: {}", e);
                CatalogError::IdentityProvider(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                error!("Introspection endpoint returned an error: {}", e);
                CatalogError::IdentityProvider(e.to_string())
            })?;

        response.json::<TokenIntrospection>().await.map_err(|e| {
            error!("Malformed introspection response: {}", e);
            CatalogError::IdentityProvider(e.to_string())
        })
    }
}

impl TokenIntrospector for HydraIntrospector {
    fn introspect<'a>(&'a self, token: &'a str, scope: Scope) -> BoxFuture<'a, Result<TokenIntrospection, CatalogError>> {
        self.request(token, scope).boxed()
    }
}
