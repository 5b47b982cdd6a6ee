use actix_web::web;

use crate::handlers::{records, topics};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/topics")
            .service(
                web::resource("")
                    .route(web::get().to(topics::get_topics))
                    .route(web::delete().to(topics::delete_topics))
            )
            .service(
                web::resource("/my")
                    .route(web::get().to(topics::get_my_topics))
            )
            .service(
                web::resource("/my/{topic_id}")
                    .route(web::get().to(topics::get_my_topic))
            )
            .service(
                web::resource("/records")
                    .route(web::post().to(records::upload_record_image))
            )
            .service(
                web::resource("/{topic_id}")
                    .route(web::get().to(topics::get_topic))
                    .route(web::put().to(topics::update_topic))
                    .route(web::delete().to(topics::delete_topic))
            )
            .service(
                web::resource("/{topic_id}/records")
                    .route(web::get().to(topics::get_topic_records))
            )
    );
}
