use actix_web::{web, HttpResponse, Responder};
use tracing::instrument;

use crate::{
    entities::{response::ApiResponse, user::RoleChangeRequest},
    errors::AppError,
    use_cases::extractors::{AuthClaims, SuperAdmin},
    utils::valid_uuid::valid_uuid,
    AppState,
};

#[instrument(skip(claims, state))]
pub async fn me(
    claims: AuthClaims,
    state: web::Data<AppState>,
) -> Result<impl Responder, AppError> {
    let user = state.auth_handler.profile(&claims.0.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(user)))
}

#[instrument(skip(_admin, state, request))]
pub async fn change_role(
    _admin: SuperAdmin,
    user_id: web::Path<String>,
    state: web::Data<AppState>,
    request: web::Json<RoleChangeRequest>,
) -> Result<impl Responder, AppError> {
    let user = state
        .auth_handler
        .change_role(&valid_uuid("user_id", &user_id)?, request.role)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(user)))
}
