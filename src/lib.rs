pub mod config;
pub mod error;
pub mod handlers;
pub mod inference;
pub mod logger;
pub mod models;

use actix_web::web;

pub use config::ServerConfig;
pub use inference::{AppState, Classification, Classifier};

/// Request bodies larger than this are rejected.
pub const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Registers every route. Shared state must be added by the caller as `web::Data<AppState>`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(JSON_BODY_LIMIT))
        .service(web::resource("/").route(web::get().to(handlers::index)))
        .service(web::resource("/health").route(web::get().to(handlers::health)))
        .service(web::resource("/model-info").route(web::get().to(handlers::model_info)))
        .service(web::resource("/predict").route(web::post().to(handlers::predict)))
        .default_service(web::route().to(handlers::not_found));
}
