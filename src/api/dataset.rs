//! `/dataset` routes

use crate::api::models::{DatasetModel, FileUploadQuery, ResourceIn};
use crate::api::{authorize, read_upload};
use crate::app_state::AppState;
use crate::auth::Scope;
use crate::error::CatalogError;
use crate::metadata::{DatasetFields, DatasetId, EntityRef, ProductId};
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse, Scope as RouteScope};

pub fn scope() -> RouteScope {
    web::scope("/dataset")
        .route("/all", web::get().to(list_datasets))
        .route("/product_datasets/{product_id}", web::get().to(list_product_datasets))
        .route("", web::post().to(create_dataset))
        .route("/{id}", web::get().to(get_dataset))
        .route("/{id}", web::put().to(update_dataset))
        .route("/{id}", web::delete().to(delete_dataset))
        .route("/{id}/resources", web::get().to(list_dataset_resources))
        .route("/{id}/resource", web::post().to(attach_dataset_link))
        .route("/{id}/resource", web::put().to(upload_dataset_file))
}

async fn list_datasets(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::DatasetRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let datasets = state.metadata_service.list_datasets(&mut uow)?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(datasets))
}

async fn list_product_datasets(
    req: HttpRequest,
    path: web::Path<ProductId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::DatasetRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let datasets: Vec<DatasetModel> = state
        .metadata_service
        .list_product_datasets(&mut uow, path.into_inner())?
        .into_iter()
        .map(DatasetModel::from)
        .collect();
    uow.commit()?;
    Ok(HttpResponse::Ok().json(datasets))
}

async fn get_dataset(
    req: HttpRequest,
    path: web::Path<DatasetId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::DatasetRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let detail = state.metadata_service.get_dataset(&mut uow, path.into_inner())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(DatasetModel::from(detail)))
}

async fn create_dataset(
    req: HttpRequest,
    body: web::Json<DatasetFields>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::DatasetAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let id = state.metadata_service.create_dataset(&mut uow, &body)?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(id))
}

async fn update_dataset(
    req: HttpRequest,
    path: web::Path<DatasetId>,
    body: web::Json<DatasetFields>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::DatasetAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    state
        .metadata_service
        .update_dataset(&mut uow, path.into_inner(), &body)?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(()))
}

async fn delete_dataset(
    req: HttpRequest,
    path: web::Path<DatasetId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::DatasetAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    state.metadata_service.delete_dataset(&mut uow, path.into_inner())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(()))
}

async fn list_dataset_resources(
    req: HttpRequest,
    path: web::Path<DatasetId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let resources = state
        .metadata_service
        .list_resources(&mut uow, EntityRef::dataset(path.into_inner()))?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(resources))
}

async fn attach_dataset_link(
    req: HttpRequest,
    path: web::Path<DatasetId>,
    body: web::Json<ResourceIn>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceAdmin).await?;
    let id = super::resource::attach_link(&state, &context, EntityRef::dataset(path.into_inner()), body.into_inner())?;
    Ok(HttpResponse::Ok().json(id))
}

async fn upload_dataset_file(
    req: HttpRequest,
    path: web::Path<DatasetId>,
    query: web::Query<FileUploadQuery>,
    payload: Multipart,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::ResourceAdmin).await?;
    let upload = read_upload(payload, state.config.storage.max_upload_bytes).await?;
    let id = super::resource::attach_file(
        &state,
        &context,
        EntityRef::dataset(path.into_inner()),
        query.into_inner(),
        upload,
    )?;
    Ok(HttpResponse::Ok().json(id))
}
