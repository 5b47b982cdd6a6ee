use actix_web::web;

use crate::handlers::{programs, topics};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/programs")
            .service(
                web::resource("")
                    .route(web::get().to(programs::get_programs))
                    .route(web::post().to(programs::create_program))
            )
            .service(
                web::resource("/my")
                    .route(web::get().to(programs::get_my_programs))
            )
            .service(
                web::resource("/my/{program_id}")
                    .route(web::get().to(programs::get_my_program))
            )
            .service(
                web::resource("/{program_id}")
                    .route(web::get().to(programs::get_program))
                    .route(web::put().to(programs::update_program))
                    .route(web::delete().to(programs::delete_program))
            )
            .service(
                web::resource("/{program_id}/topics")
                    .route(web::post().to(topics::create_topic))
            )
    );
}
