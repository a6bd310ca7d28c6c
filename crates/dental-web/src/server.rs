//! Web服务器

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};
use dental_core::Result;
use dental_database::UserRepository;
use dental_report::DocumentRenderer;
use dental_storage::{UploadStore, PUBLIC_PREFIX};
use dental_workflow::OrderService;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::{
    login_handler, logout_handler, me_handler, register_handler, require_session, session_store,
    AuthSettings, SessionStore,
};
use crate::handlers::{
    api_root, create_order, get_order, health, list_orders, order_document, order_stats,
    preview_document, update_order_status,
};
use crate::uploads::{upload_scanner_file, upload_smile_photo};

/// multipart 编码的额外开销
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// 处理器共享状态
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<SessionStore>,
    pub uploads: Arc<UploadStore>,
    pub renderer: DocumentRenderer,
    pub auth: AuthSettings,
}

impl AppState {
    pub fn new(
        orders: Arc<OrderService>,
        users: Arc<dyn UserRepository>,
        uploads: UploadStore,
        auth: AuthSettings,
    ) -> Self {
        Self {
            orders,
            users,
            sessions: session_store(&auth),
            uploads: Arc::new(uploads),
            renderer: DocumentRenderer::new(),
            auth,
        }
    }
}

pub struct WebServer {
    addr: SocketAddr,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState) -> Self {
        Self {
            addr,
            app: create_app(state),
        }
    }

    pub async fn run(self) -> Result<()> {
        info!("Starting web server on {}", self.addr);
        warn!("Order endpoints are not session-gated; only uploads and /uploads require login");

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

/// 组装全部路由
pub fn create_app(state: AppState) -> Router {
    let upload_limit = state.uploads.max_file_size().saturating_add(MULTIPART_OVERHEAD);
    let upload_limit = usize::try_from(upload_limit).unwrap_or(usize::MAX);

    // 需要登录的路由
    let protected = Router::new()
        .route("/api/upload/smile-photo", post(upload_smile_photo))
        .route("/api/upload/scanner-file", post(upload_scanner_file))
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.uploads.root()))
        .route_layer(DefaultBodyLimit::max(upload_limit))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        // 根路径
        .route("/", get(api_root))
        // 健康检查
        .route("/health", get(health))
        // 认证路由
        .nest("/api/auth", auth_routes())
        // 订单路由
        .nest("/api/dental-orders", order_routes())
        .nest("/orders", order_routes())
        .merge(protected)
        // 全局中间件
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
        .with_state(state)
}

/// 认证路由
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route("/me", get(me_handler))
}

/// 订单路由
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/stats", get(order_stats))
        .route("/document/preview", post(preview_document))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(update_order_status))
        .route("/:id/document", get(order_document))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::Duration;
    use dental_database::InMemoryRepository;
    use serde_json::Value;
    use std::path::Path;
    use tower::ServiceExt;

    pub const MIB: u64 = 1024 * 1024;

    pub fn test_state(upload_root: &Path) -> AppState {
        let repository = Arc::new(InMemoryRepository::new());
        AppState::new(
            Arc::new(OrderService::new(repository.clone())),
            repository,
            UploadStore::new(upload_root, 2 * MIB),
            AuthSettings {
                session_secret: "test-secret".to_string(),
                session_ttl: Duration::hours(1),
                secure_cookies: false,
            },
        )
    }

    pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    pub async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let (status, _, body) = send(app, request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// 注册一个用户并返回会话 Cookie
    pub async fn login_cookie(app: &Router) -> String {
        let body = serde_json::json!({ "username": "tecnico", "password": "senha123" });
        let (status, headers, _) = send(app, json_request("POST", "/api/auth/register", &body)).await;
        assert_eq!(status, StatusCode::OK);
        let set_cookie = headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        set_cookie.split(';').next().unwrap().to_string()
    }
}
