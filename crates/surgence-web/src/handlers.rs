//! HTTP处理器

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use surgence_core::SurgenceError;
use surgence_workflow::board::today_in;
use surgence_workflow::{legend, BoardEntry, BoardFeed, BoardSnapshot, Capability, Snapshot, StatusBoard};
use tracing::{info, warn};

use crate::html::render_board;

/// 共享状态
pub struct AppState<F: BoardFeed> {
    pub board: Arc<StatusBoard<F>>,
    /// 页面自动刷新周期
    pub cadence: Duration,
    /// 查询其他日期所需的 Bearer token，未配置时不开放
    pub access_token: Option<String>,
}

impl<F: BoardFeed> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            board: Arc::clone(&self.board),
            cadence: self.cadence,
            access_token: self.access_token.clone(),
        }
    }
}

/// 看板视图
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub date: NaiveDate,
    pub is_today: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub badge: &'static str,
    pub can_navigate: bool,
    pub entries: Vec<BoardEntry>,
}

impl BoardView {
    pub fn from_board<F: BoardFeed>(board: &StatusBoard<F>) -> Self {
        let Snapshot {
            token,
            data,
            error,
            fetched_at,
        } = board.latest();
        let caps = board.capabilities();

        let (date, entries) = match data {
            Some(BoardSnapshot { date, entries }) => (date, entries),
            None => (board.selected_date(), Vec::new()),
        };

        Self {
            date,
            is_today: date == today_in(board.timezone()),
            loading: token == 0,
            error,
            fetched_at,
            badge: caps.badge(),
            can_navigate: caps.allows(Capability::NavigateBoardDates),
            entries,
        }
    }

    /// 单次查询得到的某一天看板
    pub fn for_day<F: BoardFeed>(board: &StatusBoard<F>, snapshot: BoardSnapshot) -> Self {
        let caps = board.capabilities();
        Self {
            is_today: snapshot.date == today_in(board.timezone()),
            date: snapshot.date,
            loading: false,
            error: None,
            fetched_at: Some(Utc::now()),
            badge: caps.badge(),
            can_navigate: caps.allows(Capability::NavigateBoardDates),
            entries: snapshot.entries,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub date: Option<NaiveDate>,
}

/// 错误响应
#[derive(Debug)]
pub struct ApiError(pub SurgenceError);

impl From<SurgenceError> for ApiError {
    fn from(e: SurgenceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            SurgenceError::NotFound(_) => StatusCode::NOT_FOUND,
            SurgenceError::Validation(_) => StatusCode::BAD_REQUEST,
            SurgenceError::Permission(_) => StatusCode::FORBIDDEN,
            SurgenceError::Api { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            SurgenceError::Http(_) | SurgenceError::Decode(_) | SurgenceError::Stream(_) => {
                StatusCode::BAD_GATEWAY
            }
            SurgenceError::Config(_) | SurgenceError::Io(_) | SurgenceError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// 根路径
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Surgence Status Board",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "board": "/status-board",
            "board_json": "/api/status-board",
            "refresh": "/api/status-board/refresh",
            "legend": "/api/legend"
        }
    }))
}

/// 健康检查
pub async fn health<F: BoardFeed>(State(state): State<AppState<F>>) -> impl IntoResponse {
    let snapshot = state.board.latest();
    Json(json!({
        "status": if snapshot.error.is_some() { "degraded" } else { "healthy" },
        "timestamp": Utc::now().to_rfc3339(),
        "last_fetch": snapshot.fetched_at.map(|t| t.to_rfc3339()),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 看板页面
pub async fn board_page<F: BoardFeed>(State(state): State<AppState<F>>) -> Html<String> {
    let view = BoardView::from_board(&state.board);
    Html(render_board(&view, &legend(), state.cadence))
}

/// 看板 JSON
///
/// `date` 参数需要请求携带访问 token，且只做单次查询，公共看板仍停留在所选日期。
pub async fn board_json<F: BoardFeed>(
    State(state): State<AppState<F>>,
    headers: HeaderMap,
    Query(query): Query<BoardQuery>,
) -> Result<Json<BoardView>, ApiError> {
    let Some(date) = query.date else {
        return Ok(Json(BoardView::from_board(&state.board)));
    };

    authorize(&state, &headers)?;
    let snapshot = state.board.fetch_day(date).await?;
    Ok(Json(BoardView::for_day(&state.board, snapshot)))
}

fn authorize<F: BoardFeed>(state: &AppState<F>, headers: &HeaderMap) -> Result<(), SurgenceError> {
    let Some(expected) = state.access_token.as_deref() else {
        return Err(SurgenceError::Permission(
            "Date selection is not enabled on this board".to_string(),
        ));
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    if provided == Some(expected) {
        Ok(())
    } else {
        warn!("Rejected status board date request without a valid token");
        Err(SurgenceError::Permission("Missing or invalid access token".to_string()))
    }
}

/// 手动刷新
pub async fn refresh_board<F: BoardFeed>(State(state): State<AppState<F>>) -> impl IntoResponse {
    let token = state.board.refresh();
    info!("Manual status board refresh #{}", token);
    (StatusCode::ACCEPTED, Json(json!({ "token": token })))
}

/// 状态图例
pub async fn legend_json() -> impl IntoResponse {
    Json(legend())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::FixedOffset;
    use surgence_core::{PatientSummary, Result, Role};
    use surgence_workflow::fixtures::FixtureBuilder;
    use surgence_workflow::{CapabilitySet, DaySelection};
    use tower::ServiceExt;

    struct FixtureFeed;

    #[async_trait]
    impl BoardFeed for FixtureFeed {
        async fn today(&self) -> Result<Vec<PatientSummary>> {
            let today = Utc::now().date_naive();
            Ok(FixtureBuilder::new(9).day(today, 4).build())
        }

        async fn for_date(&self, date: NaiveDate) -> Result<Vec<PatientSummary>> {
            Ok(FixtureBuilder::new(10).day(date, 2).build())
        }
    }

    const TOKEN: &str = "kiosk-secret";

    async fn app_for(role: Role) -> (axum::Router, AppState<FixtureFeed>) {
        let board = StatusBoard::activate(
            FixtureFeed,
            CapabilitySet::for_role(role),
            FixedOffset::east_opt(0).unwrap(),
            Duration::from_secs(30),
        );
        let state = AppState {
            board: Arc::new(board),
            cadence: Duration::from_secs(30),
            access_token: Some(TOKEN.to_string()),
        };
        let mut rx = state.board.subscribe();
        rx.wait_for(|s| !s.is_loading()).await.unwrap();
        (router(state.clone()), state)
    }

    async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        send_json(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn get_json_with_token(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .uri(uri)
            .header("authorization", format!("Bearer {}", TOKEN))
            .body(Body::empty())
            .unwrap();
        send_json(app, request).await
    }

    async fn send_json(app: axum::Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_board_json_for_guest() {
        let (app, _state) = app_for(Role::Guest).await;
        let (status, body) = get_json(app, "/api/status-board").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_today"], true);
        assert_eq!(body["badge"], "GUEST");
        let entries = body["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0]["ordinal"], "P001");
        assert!(entries[0]["identity"].is_null());
    }

    #[tokio::test]
    async fn test_guest_board_refuses_other_dates() {
        let (app, _state) = app_for(Role::Guest).await;
        let (status, body) = get_json_with_token(app, "/api/status-board?date=2025-08-01").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn test_anonymous_date_request_leaves_kiosk_on_today() {
        let (app, _state) = app_for(Role::SurgicalTeam).await;
        let (status, _) = get_json(app.clone(), "/api/status-board?date=2001-01-01").await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = get_json(app, "/api/status-board").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_today"], true);
        assert_eq!(body["entries"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_team_date_lookup_is_one_off() {
        let (app, state) = app_for(Role::SurgicalTeam).await;
        let (status, body) = get_json_with_token(app.clone(), "/api/status-board?date=2025-08-01").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["date"], "2025-08-01");
        assert_eq!(body["is_today"], false);
        assert_eq!(body["entries"].as_array().unwrap().len(), 2);
        assert!(!body["entries"][0]["identity"].is_null());
        assert_eq!(state.board.selection(), DaySelection::Today);

        let (_, body) = get_json(app, "/api/status-board").await;
        assert_eq!(body["is_today"], true);
    }

    #[tokio::test]
    async fn test_date_lookup_disabled_without_configured_token() {
        let (_, mut state) = app_for(Role::Admin).await;
        state.access_token = None;
        let (status, _) =
            get_json_with_token(router(state), "/api/status-board?date=2025-08-01").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_refresh_returns_new_token() {
        let (app, state) = app_for(Role::Guest).await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/status-board/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(state.board.latest().token >= 1);
    }

    #[tokio::test]
    async fn test_board_page_renders_html() {
        let (app, _state) = app_for(Role::Guest).await;
        let response = app
            .oneshot(Request::builder().uri("/status-board").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("P001"));
        assert!(html.contains("http-equiv=\"refresh\" content=\"30\""));
    }

    #[test]
    fn test_error_status_mapping() {
        let response = ApiError(SurgenceError::Api {
            status: 404,
            detail: "Patient not found".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError(SurgenceError::Http("connection refused".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
