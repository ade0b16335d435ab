//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! All resource endpoints are mounted under `/api/v1`; `/health` sits at
//! the root. With the `swagger-ui` feature the UI is served at
//! `/swagger-ui` and the document at `/api-docs/openapi.json`.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

pub use openapi::ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
    };

    router
}
