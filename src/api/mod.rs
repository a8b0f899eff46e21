//! HTTP surface of the catalog
//!
//! Each entity gets its own scope. Handlers authorize first, buffer any
//! upload, then run a single unit of work and commit it before responding.

pub mod dataset;
pub mod models;
pub mod product;
pub mod resource;
pub mod simulation;

use crate::app_state::AppState;
use crate::auth::{self, Scope};
use crate::error::CatalogError;
use crate::service::request_context::RequestContext;
use crate::storage::config::StorageBackend;
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use log::{debug, info};

/// Multipart field carrying the uploaded file
pub const UPLOAD_FIELD: &str = "file";

/// Register extractor configs, all entity scopes and the static resource mount
pub fn configure(cfg: &mut web::ServiceConfig, state: &web::Data<AppState>) {
    cfg.app_data(state.clone())
        .app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(product::scope())
        .service(dataset::scope())
        .service(resource::scope())
        .service(simulation::scope());

    let storage = &state.config.storage;
    if storage.backend == StorageBackend::Local {
        info!("Serving {} under {}", storage.resource_root, storage.url_prefix);
        cfg.service(actix_files::Files::new(&storage.url_prefix, &storage.resource_root));
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| CatalogError::validation(err.to_string()).into())
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| CatalogError::validation(err.to_string()).into())
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| CatalogError::validation(err.to_string()).into())
}

/// Authorize the request for `scope` and build its context
pub async fn authorize(req: &HttpRequest, state: &AppState, scope: Scope) -> Result<RequestContext, CatalogError> {
    let authorized = auth::authorize(req, state.introspector.as_ref(), scope).await?;
    Ok(RequestContext::from_request(req, authorized))
}

/// File read from a multipart body
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

/// Buffer the `file` field of a multipart body, enforcing `limit` bytes
pub async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Upload, CatalogError> {
    let mut upload = None;

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(|e| CatalogError::validation(format!("malformed multipart body: {}", e)))?;
        let disposition = field.content_disposition();
        let name = disposition.and_then(|cd| cd.get_name()).map(str::to_string);
        let filename = disposition.and_then(|cd| cd.get_filename()).map(str::to_string);

        if name.as_deref() != Some(UPLOAD_FIELD) || upload.is_some() {
            while let Some(chunk) = field.next().await {
                chunk.map_err(|e| CatalogError::validation(format!("malformed multipart body: {}", e)))?;
            }
            continue;
        }

        let filename = filename.ok_or_else(|| CatalogError::validation("uploaded file has no filename"))?;
        let mut bytes = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| CatalogError::validation(format!("malformed multipart body: {}", e)))?;
            if bytes.len() + chunk.len() > limit {
                return Err(CatalogError::PayloadTooLarge { limit });
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!("Received upload {} ({} bytes)", filename, bytes.len());
        upload = Some(Upload {
            filename,
            data: bytes.freeze(),
        });
    }

    upload.ok_or_else(|| CatalogError::validation(format!("multipart field '{}' is required", UPLOAD_FIELD)))
}
