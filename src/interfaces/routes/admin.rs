use actix_web::web;

use crate::handlers::{system::admin_health_check, users};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .service(admin_health_check)
            .service(
                web::resource("/users/{user_id}/role")
                    .route(web::patch().to(users::change_role))
            )
    );
}
