use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::{
        program::ListParams,
        response::{ApiResponse, ListResponse, Page},
    },
    errors::AppError,
    multipart::Demultiplexer,
    use_cases::extractors::ContentManager,
    utils::valid_uuid::valid_uuid,
    AppState,
};

#[instrument(skip(state, query))]
pub async fn get_programs(
    state: web::Data<AppState>,
    query: web::Query<ListParams>,
) -> Result<impl Responder, AppError> {
    let page = Page::new(query.page, query.per_page);
    let (programs, total) = state.program_handler.list_published(page).await?;
    Ok(HttpResponse::Ok().json(ListResponse::new(programs, total)))
}

#[instrument(skip(manager, state, query))]
pub async fn get_my_programs(
    manager: ContentManager,
    state: web::Data<AppState>,
    query: web::Query<ListParams>,
) -> Result<impl Responder, AppError> {
    let page = Page::new(query.page, query.per_page);
    let (programs, total) = state.program_handler.list_mine(&manager.0, page).await?;
    Ok(HttpResponse::Ok().json(ListResponse::new(programs, total)))
}

#[instrument(skip(manager, state))]
pub async fn get_my_program(
    manager: ContentManager,
    program_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("program_id", &program_id)?;
    let program = state.program_handler.get_mine(&manager.0, &id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(program)))
}

#[instrument(skip(state))]
pub async fn get_program(
    program_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("program_id", &program_id)?;
    let program = state.program_handler.get_published(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(program)))
}

#[instrument(skip(manager, state, payload), fields(user = %manager.0.id))]
pub async fn create_program(
    manager: ContentManager,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let mut demux = Demultiplexer::new(payload, state.part_limits);
    let program = state.program_handler.create_program(&manager.0, &mut demux).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(program)))
}

#[instrument(skip(manager, state, payload), fields(user = %manager.0.id))]
pub async fn update_program(
    manager: ContentManager,
    program_id: web::Path<String>,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("program_id", &program_id)?;
    let mut demux = Demultiplexer::new(payload, state.part_limits);
    let program = state
        .program_handler
        .update_program(&manager.0, &id, &mut demux)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(program)))
}

#[instrument(skip(manager, state), fields(user = %manager.0.id))]
pub async fn delete_program(
    manager: ContentManager,
    program_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("program_id", &program_id)?;
    state.program_handler.delete_program(&manager.0, &id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::empty()))
}
