pub mod handlers;
pub mod middlewares;
pub mod multipart;
pub mod repositories;
pub mod routes;
