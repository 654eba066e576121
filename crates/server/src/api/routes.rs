use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use av1batch_core::EncoderRunner;

use super::{batch, handlers, middleware::metrics_middleware, queue, ws};
use crate::state::AppState;

pub fn create_router<R: EncoderRunner + 'static>(state: Arc<AppState<R>>) -> Router {
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config::<R>))
        .route("/metrics", get(handlers::metrics::<R>))
        // Queue
        .route(
            "/queue",
            get(queue::list_queue::<R>)
                .post(queue::enqueue::<R>)
                .delete(queue::remove::<R>),
        )
        .route("/queue/folder", post(queue::enqueue_folder::<R>))
        // Batch
        .route("/batch", get(batch::get_status::<R>).post(batch::start::<R>))
        .route("/batch/cancel", post(batch::cancel::<R>))
        .route("/batch/stop", post(batch::stop::<R>))
        // Live events
        .route("/ws", get(ws::ws_handler::<R>))
        .route_layer(middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
}
