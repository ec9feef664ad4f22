use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use deployment::Deployment;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::DeploymentImpl;

pub mod admins;
pub mod ads;
pub mod email;
pub mod health;
pub mod imports;
pub mod records;

fn cors_layer(app_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match app_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(err) => {
            warn!(app_url, error = %err, "APP_URL is not a valid origin; CORS disabled");
            layer
        }
    }
}

pub fn router(deployment: DeploymentImpl) -> Router {
    let api = Router::new()
        .merge(health::router(&deployment))
        .merge(records::router(&deployment))
        .merge(imports::router(&deployment))
        .merge(email::router(&deployment))
        .merge(ads::router(&deployment))
        .merge(admins::router(&deployment));

    Router::new()
        .nest("/api", api)
        .layer(cors_layer(&deployment.config().app_url))
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}
