//! Fixed token table for local development and tests

use crate::auth::{Scope, TokenIntrospection, TokenIntrospector};
use crate::error::CatalogError;
use chrono::{DateTime, Utc};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde::Deserialize;
use std::collections::HashMap;

/// One configured token
#[derive(Debug, Clone, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub client_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct StaticIntrospector {
    tokens: HashMap<String, StaticToken>,
}

impl StaticIntrospector {
    pub fn new(tokens: impl IntoIterator<Item = StaticToken>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|entry| (entry.token.clone(), entry))
                .collect(),
        }
    }

    fn lookup(&self, token: &str) -> TokenIntrospection {
        match self.tokens.get(token) {
            Some(entry) => TokenIntrospection {
                active: true,
                scope: Some(entry.scopes.join(" ")),
                client_id: Some(entry.client_id.clone()),
                sub: Some(entry.user_id.clone().unwrap_or_else(|| entry.client_id.clone())),
                exp: entry.expires_at.map(|at| at.timestamp()),
            },
            None => TokenIntrospection::inactive(),
        }
    }
}

impl TokenIntrospector for StaticIntrospector {
    fn introspect<'a>(&'a self, token: &'a str, _scope: Scope) -> BoxFuture<'a, Result<TokenIntrospection, CatalogError>> {
        future::ready(Ok(self.lookup(token))).boxed()
    }
}
