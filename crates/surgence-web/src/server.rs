//! Web服务器

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use surgence_core::Result;
use surgence_workflow::BoardFeed;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::handlers::{api_root, board_json, board_page, health, legend_json, refresh_board, AppState};

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new<F: BoardFeed>(addr: SocketAddr, state: AppState<F>) -> Self {
        Self {
            addr,
            app: router(state),
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting status board server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// 看板路由
pub fn router<F: BoardFeed>(state: AppState<F>) -> Router {
    Router::new()
        .route("/", get(api_root))
        .route("/health", get(health::<F>))
        .route("/status-board", get(board_page::<F>))
        .route("/api/status-board", get(board_json::<F>))
        .route("/api/status-board/refresh", post(refresh_board::<F>))
        .route("/api/legend", get(legend_json))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}
