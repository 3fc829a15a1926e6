//! HTTP service.
//!
//! | Method   | Path                          | Handler                       |
//! |----------|-------------------------------|-------------------------------|
//! | `GET`    | `/`                           | health check                  |
//! | `GET`    | `/pamphlet/:id/tile/:hash`    | tile bytes, immutable caching |
//! | `GET`    | `/pamphlet/:id/metadata`      | metadata, short-lived caching |
//! | `POST`   | `/pamphlet/:id/invalidate`    | bump version                  |
//! | `DELETE` | `/pamphlet/:id`               | delete pamphlet               |

mod error;
mod handlers;
pub mod headers;
mod state;

use std::io;

use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use error::ApiError;
pub use headers::DEFAULT_METADATA_MAX_AGE;
pub use state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health))
        .route("/pamphlet/:id/tile/:hash", get(handlers::get_tile))
        .route("/pamphlet/:id/metadata", get(handlers::get_metadata))
        .route("/pamphlet/:id/invalidate", post(handlers::invalidate))
        .route("/pamphlet/:id", delete(handlers::delete_pamphlet))
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then finish in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP server listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}
