use actix_web::{error::{JsonPayloadError, QueryPayloadError}, HttpRequest};

use crate::errors::AppError;

/// Renders malformed JSON bodies and query strings with the usual error envelope.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid JSON payload: {}", err)).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::BadRequest(format!("Invalid query string: {}", err)).into()
}
