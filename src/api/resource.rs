//! `/resource` routes plus the attach helpers shared by products and datasets

use crate::api::models::{FileUploadQuery, ReplaceFileQuery, ResourceIn, ResourceUpdateIn};
use crate::api::{authorize, read_upload, Upload};
use crate::app_state::AppState;
use crate::auth::Scope;
use crate::error::CatalogError;
use crate::metadata::{EntityRef, ReferenceType, ResourceId};
use crate::service::request_context::RequestContext;
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Scope as RouteScope};

pub fn scope() -> RouteScope {
    web::scope("/resource")
        .route("/{id}", web::get().to(get_resource))
        .route("/{id}", web::put().to(update_resource))
        .route("/{id}", web::delete().to(delete_resource))
        .route("/{id}/file", web::put().to(replace_file))
}

pub(crate) fn attach_link(
    state: &AppState,
    context: &RequestContext,
    owner: EntityRef,
    body: ResourceIn,
) -> Result<ResourceId, CatalogError> {
    if body.reference_type == Some(ReferenceType::Path) {
        return Err(CatalogError::validation("file resources must be uploaded"));
    }

    let mut uow = state.metadata_service.begin(context)?;
    let id = state
        .storage_service
        .attach_link(&mut uow, owner, body.resource_type, &body.reference, body.title)?;
    uow.commit()?;
    Ok(id)
}

pub(crate) fn attach_file(
    state: &AppState,
    context: &RequestContext,
    owner: EntityRef,
    query: FileUploadQuery,
    upload: Upload,
) -> Result<ResourceId, CatalogError> {
    let mut uow = state.metadata_service.begin(context)?;
    let id = state.storage_service.attach_file(
        &mut uow,
        owner,
        query.resource_type,
        &upload.data,
        &upload.filename,
        query.title,
    )?;
    uow.commit()?;
    Ok(id)
}

async fn get_resource(
    req: HttpRequest,
    path: web::Path<ResourceId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let resource = state.storage_service.get_resource(&mut uow, path.into_inner())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(resource))
}

async fn update_resource(
    req: HttpRequest,
    path: web::Path<ResourceId>,
    body: web::Json<ResourceUpdateIn>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    state
        .storage_service
        .update_resource(&mut uow, path.into_inner(), &body.into_inner().into())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(()))
}

async fn delete_resource(
    req: HttpRequest,
    path: web::Path<ResourceId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    state.storage_service.delete_resource(&mut uow, path.into_inner())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(()))
}

async fn replace_file(
    req: HttpRequest,
    path: web::Path<ResourceId>,
    query: web::Query<ReplaceFileQuery>,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceAdmin).await?;
    let upload = read_upload(payload, state.config.storage.max_upload_bytes).await?;

    let mut uow = state.metadata_service.begin(&context)?;
    state.storage_service.replace_file(
        &mut uow,
        path.into_inner(),
        query.owner(),
        &upload.data,
        &upload.filename,
    )?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(true))
}
