//! `/simulation` routes

use crate::api::authorize;
use crate::app_state::AppState;
use crate::auth::Scope;
use crate::error::CatalogError;
use crate::metadata::{SimulationFields, SimulationId};
use actix_web::{web, HttpRequest, HttpResponse, Scope as RouteScope};

pub fn scope() -> RouteScope {
    web::scope("/simulation")
        .route("/all", web::get().to(list_simulations))
        .route("", web::post().to(create_simulation))
        .route("/{id}", web::get().to(get_simulation))
        .route("/{id}", web::put().to(update_simulation))
        .route("/{id}", web::delete().to(delete_simulation))
}

async fn list_simulations(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::SimulationRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let simulations = state.metadata_service.list_simulations(&mut uow)?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(simulations))
}

async fn get_simulation(
    req: HttpRequest,
    path: web::Path<SimulationId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::SimulationRead).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let simulation = state.metadata_service.get_simulation(&mut uow, path.into_inner())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(simulation))
}

async fn create_simulation(
    req: HttpRequest,
    body: web::Json<SimulationFields>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::SimulationAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    let id = state.metadata_service.create_simulation(&mut uow, &body)?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(id))
}

async fn update_simulation(
    req: HttpRequest,
    path: web::Path<SimulationId>,
    body: web::Json<SimulationFields>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::SimulationAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    state
        .metadata_service
        .update_simulation(&mut uow, path.into_inner(), &body)?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(()))
}

async fn delete_simulation(
    req: HttpRequest,
    path: web::Path<SimulationId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, CatalogError> {
    let context = authorize(&req, &state, Scope::SimulationAdmin).await?;
    let mut uow = state.metadata_service.begin(&context)?;
    state.metadata_service.delete_simulation(&mut uow, path.into_inner())?;
    uow.commit()?;
    Ok(HttpResponse::Ok().json(()))
}
