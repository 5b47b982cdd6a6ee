use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::{
        response::{ApiResponse, ListResponse, Page},
        topic::{TopicIdsParams, TopicListParams},
    },
    errors::AppError,
    multipart::Demultiplexer,
    use_cases::extractors::{ContentManager, SuperAdmin},
    utils::valid_uuid::valid_uuid,
    AppState,
};

#[instrument(skip(state, query))]
pub async fn get_topics(
    state: web::Data<AppState>,
    query: web::Query<TopicListParams>,
) -> Result<impl Responder, AppError> {
    let page = Page::new(query.page, query.per_page);
    let (topics, total) = state.topic_handler.list_published(query.program, page).await?;
    Ok(HttpResponse::Ok().json(ListResponse::new(topics, total)))
}

#[instrument(skip(manager, state, query))]
pub async fn get_my_topics(
    manager: ContentManager,
    state: web::Data<AppState>,
    query: web::Query<TopicListParams>,
) -> Result<impl Responder, AppError> {
    let page = Page::new(query.page, query.per_page);
    let (topics, total) = state
        .topic_handler
        .list_mine(&manager.0, query.program, page)
        .await?;
    Ok(HttpResponse::Ok().json(ListResponse::new(topics, total)))
}

#[instrument(skip(manager, state))]
pub async fn get_my_topic(
    manager: ContentManager,
    topic_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("topic_id", &topic_id)?;
    let topic = state.topic_handler.get_mine(&manager.0, &id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(topic)))
}

#[instrument(skip(state))]
pub async fn get_topic(
    topic_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("topic_id", &topic_id)?;
    let topic = state.topic_handler.get_published(&id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(topic)))
}

#[instrument(skip(manager, state, payload), fields(user = %manager.0.id))]
pub async fn create_topic(
    manager: ContentManager,
    program_id: web::Path<String>,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let program_id = valid_uuid("program_id", &program_id)?;
    let mut demux = Demultiplexer::new(payload, state.part_limits);
    let topic = state
        .topic_handler
        .create_topic(&manager.0, &program_id, &mut demux)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(topic)))
}

#[instrument(skip(manager, state, payload), fields(user = %manager.0.id))]
pub async fn update_topic(
    manager: ContentManager,
    topic_id: web::Path<String>,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("topic_id", &topic_id)?;
    let mut demux = Demultiplexer::new(payload, state.part_limits);
    let topic = state
        .topic_handler
        .update_topic(&manager.0, &id, &mut demux)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(topic)))
}

#[instrument(skip(manager, state), fields(user = %manager.0.id))]
pub async fn delete_topic(
    manager: ContentManager,
    topic_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("topic_id", &topic_id)?;
    state.topic_handler.delete_topic(&manager.0, &id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::empty()))
}

#[instrument(skip(admin, state, query), fields(user = %admin.0.id))]
pub async fn delete_topics(
    admin: SuperAdmin,
    state: web::Data<AppState>,
    query: web::Query<TopicIdsParams>,
) -> Result<impl Responder, AppError> {
    let ids = query.parse()?;
    state.topic_handler.delete_topics(&admin.0, &ids).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::empty()))
}

#[instrument(skip(state))]
pub async fn get_topic_records(
    topic_id: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let id = valid_uuid("topic_id", &topic_id)?;
    let records = state.record_handler.list_records(&id).await?;
    let total = records.len() as i64;
    Ok(HttpResponse::Ok().json(ListResponse::new(records, total)))
}
