//! Configuration for token introspection backends

use crate::auth::hydra::HydraIntrospector;
use crate::auth::static_tokens::{StaticIntrospector, StaticToken};
use crate::auth::TokenIntrospector;
use crate::error::CatalogError;
use log::{info, warn};
use serde::Deserialize;
use std::env;
use std::sync::Arc;
use std::time::Duration;

/// Available introspection backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum AuthBackend {
    #[default]
    Hydra,
    Static,
}

impl std::str::FromStr for AuthBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hydra" => Ok(AuthBackend::Hydra),
            "static" => Ok(AuthBackend::Static),
            _ => Err(format!("Unknown auth backend: {}", s)),
        }
    }
}

impl TryFrom<String> for AuthBackend {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub backend: AuthBackend,
    /// Hydra admin API base URL
    pub introspection_url: String,
    pub timeout_secs: u64,
    /// Token table for the static backend
    pub tokens: Vec<StaticToken>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            backend: AuthBackend::default(),
            introspection_url: "http://localhost:4445".to_string(),
            timeout_secs: 10,
            tokens: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Apply `AUTH_BACKEND` and `INTROSPECTION_URL` overrides
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("AUTH_BACKEND") {
            match backend_str.parse::<AuthBackend>() {
                Ok(backend) => {
                    info!("Using auth backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => {
                    warn!("Invalid auth backend in environment: {}. Keeping {:?}.", e, self.backend);
                }
            }
        }
        if let Ok(url) = env::var("INTROSPECTION_URL") {
            info!("Using introspection URL from environment: {}", url);
            self.introspection_url = url;
        }
    }

    pub fn create_introspector(&self) -> Result<Arc<dyn TokenIntrospector>, CatalogError> {
        match self.backend {
            AuthBackend::Hydra => {
                info!("Using Hydra token introspection at {}", self.introspection_url);
                Ok(Arc::new(HydraIntrospector::new(
                    &self.introspection_url,
                    Duration::from_secs(self.timeout_secs),
                )?))
            }
            AuthBackend::Static => {
                if self.tokens.is_empty() {
                    warn!("Static auth backend configured without tokens; every request will be rejected");
                } else {
                    info!("Using static token table with {} entries", self.tokens.len());
                }
                Ok(Arc::new(StaticIntrospector::new(self.tokens.clone())))
            }
        }
    }
}
