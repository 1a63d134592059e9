use std::sync::Arc;

use log::error;
use warp::http::header::CONTENT_TYPE;
use warp::http::StatusCode;
use warp::Filter;

use crate::metrics::{encode_text, CollectionEngine};

/// Content type of the Prometheus text exposition format.
const TEXT_FORMAT: &str = prometheus::TEXT_FORMAT;

/// Creates the route for metric scrapes.
///
/// This route listens for GET requests at the `/metrics` path. Every request runs one
/// collection cycle against the container runtime. If the runtime cannot be queried the
/// scrape fails with 503 instead of reporting an empty inventory.
///
/// Returns a boxed Warp filter that handles scrape requests.
pub fn metrics_route(
    engine: Arc<CollectionEngine>,
) -> warp::filters::BoxedFilter<(impl warp::Reply,)> {
    warp::get()
        .and(warp::path("metrics"))
        .and(warp::path::end())
        .and(warp::any().map(move || Arc::clone(&engine)))
        .and_then(handle_scrape)
        .boxed()
}

/// Creates the route for health checks.
///
/// This route listens for GET requests at the `/health` path and returns a JSON
/// response "OK". It reports on the exporter only and never contacts the runtime.
pub fn health_check_route() -> warp::filters::BoxedFilter<(impl warp::Reply,)> {
    warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .map(|| warp::reply::json(&"OK"))
        .boxed()
}

async fn handle_scrape(engine: Arc<CollectionEngine>) -> Result<impl warp::Reply, warp::Rejection> {
    let (body, status) = match engine.collect().await {
        Ok(snapshot) => match encode_text(&snapshot) {
            Ok(body) => (body, StatusCode::OK),
            Err(e) => {
                error!("Scrape failed: {}", e);
                (format!("{}\n", e), StatusCode::INTERNAL_SERVER_ERROR)
            }
        },
        Err(e) => {
            error!("Scrape failed: {}", e);
            (format!("{}\n", e), StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let content_type = if status == StatusCode::OK {
        TEXT_FORMAT
    } else {
        "text/plain; charset=utf-8"
    };

    Ok(warp::reply::with_status(
        warp::reply::with_header(body, CONTENT_TYPE, content_type),
        status,
    ))
}
