use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::response::ApiResponse,
    errors::AppError,
    multipart::Demultiplexer,
    use_cases::extractors::ContentManager,
    AppState,
};

#[instrument(skip(manager, state, payload), fields(user = %manager.0.id))]
pub async fn upload_record_image(
    manager: ContentManager,
    state: web::Data<AppState>,
    payload: Multipart,
) -> Result<impl Responder, AppError> {
    let mut demux = Demultiplexer::new(payload, state.part_limits);
    let record = state.record_handler.upload_image(&manager.0, &mut demux).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(record)))
}
