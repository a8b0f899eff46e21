//! `/product` routes

use crate::api::models::{CatalogProductModel, FileUploadQuery, ProductIn, ProductModel, ResourceIn};
use crate::api::{authorize, read_upload};
use crate::app_state::AppState;
use crate::auth::Scope;
use crate::error::CatalogError;
use crate::metadata::{EntityRef, ProductId};
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Scope as RouteScope};

pub fn scope() -> RouteScope {
    web::scope("/product")
        .route("/all", web::get().to(list_products))
        .route("/catalog_products", web::get().to(list_catalog_products))
        .route("", web::post().to(create_product))
        .route("/{id}", web::get().to(get_product))
        .route("/{id}", web::put().to(update_product))
        .route("/{id}", web::delete().to(delete_product))
        .route("/{id}/resources", web::get().to(list_product_resources))
        .route("/{id}/resource", web::post().to(attach_product_link))
        .route("/{id}/resource", web::put().to(upload_product_file))
}

async fn list_products(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ProductRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let products = state.metadata_service.list_products(&mut uow)?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(products))
}

async fn list_catalog_products(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ProductRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let catalog: Vec<CatalogProductModel> = state
        .metadata_service
        .list_catalog_products(&mut uow)?
        .into_iter()
        .map(CatalogProductModel::from)
        .collect();
    uow.commit()?;
    Ok(HttpResponse::Ok().json(catalog))
}

async fn get_product(
    req: HttpRequest,
    path: web::Path<ProductId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ProductRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let detail = state.metadata_service.get_product(&mut uow, path.into_inner())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(ProductModel::from(detail)))
}

async fn create_product(
    req: HttpRequest,
    body: web::Json<ProductIn>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ProductAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let id = state
        .metadata_service
        .create_product(&mut uow, &body.into_inner().into())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(id))
}

async fn update_product(
    req: HttpRequest,
    path: web::Path<ProductId>,
    body: web::Json<ProductIn>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ProductAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    state
        .metadata_service
        .update_product(&mut uow, path.into_inner(), &body.into_inner().into())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(()))
}

async fn delete_product(
    req: HttpRequest,
    path: web::Path<ProductId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ProductAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    state.metadata_service.delete_product(&mut uow, path.into_inner())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(()))
}

async fn list_product_resources(
    req: HttpRequest,
    path: web::Path<ProductId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let resources = state
        .metadata_service
        .list_resources(&mut uow, EntityRef::product(path.into_inner()))?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(resources))
}

async fn attach_product_link(
    req: HttpRequest,
    path: web::Path<ProductId>,
    body: web::Json<ResourceIn>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceAdmin).await?;
    let id = super::resource::attach_link(&state, &context, EntityRef::product(path.into_inner()), body.into_inner())?;
    Ok(HttpResponse::Ok().json(id))
}

async fn upload_product_file(
    req: HttpRequest,
    path: web::Path<ProductId>,
    query: web::Query<FileUploadQuery>,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceAdmin).await?;
    let upload = read_upload(payload, state.config.storage.max_upload_bytes).await?;
    let id = super::resource::attach_file(
        &state,
        &context,
        EntityRef::product(path.into_inner()),
        query.into_inner(),
        upload,
    )?;
    Ok(HttpResponse::Ok().json(id))
}
