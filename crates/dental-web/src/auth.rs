//! 用户认证和会话管理
//!
//! 登录成功后在进程内保存会话，浏览器通过签名 Cookie 携带会话ID。
//! 会话只用于保护上传和文件访问接口。

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use dental_core::{DentalError, NewUser, User};
use dental_database::UserRepository;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub const SESSION_COOKIE: &str = "dental.sid";

/// 请求范围内的登录身份，由会话中间件写入请求扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: i32,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    user_id: i32,
    expires_at: DateTime<Utc>,
}

/// 会话设置
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_secret: String,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
}

/// 进程内会话存储
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    secret: String,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            secret: secret.into(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 创建会话，返回写入 Cookie 的签名值
    pub async fn create(&self, user_id: i32) -> String {
        let session_id = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let entry = SessionEntry {
            user_id,
            expires_at: Utc::now() + self.ttl,
        };
        self.sessions.write().await.insert(session_id.clone(), entry);
        format!("{}.{}", session_id, self.sign(&session_id))
    }

    /// 校验签名和有效期，过期的会话顺便删除
    pub async fn resolve(&self, cookie_value: &str) -> Option<SessionContext> {
        let session_id = self.verify(cookie_value)?;

        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(session_id) {
                Some(entry) if entry.expires_at > now => {
                    return Some(SessionContext {
                        user_id: entry.user_id,
                    })
                }
                None => return None,
                Some(_) => {}
            }
        }

        self.sessions.write().await.remove(session_id);
        None
    }

    pub async fn destroy(&self, cookie_value: &str) {
        if let Some(session_id) = self.verify(cookie_value) {
            self.sessions.write().await.remove(session_id);
        }
    }

    /// 清理过期会话，返回删除数量
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        before - sessions.len()
    }

    fn sign(&self, session_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b".");
        hasher.update(session_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn verify<'a>(&self, cookie_value: &'a str) -> Option<&'a str> {
        let (session_id, signature) = cookie_value.rsplit_once('.')?;
        if constant_time_eq(self.sign(session_id).as_bytes(), signature.as_bytes()) {
            Some(session_id)
        } else {
            None
        }
    }
}

/// 加盐 SHA-256，存储格式为 `salt$hexdigest`
pub fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, digest_password(&salt, password))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, digest)) => {
            constant_time_eq(digest_password(salt, password).as_bytes(), digest.as_bytes())
        }
        None => false,
    }
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// 从 Cookie 头中取出会话值
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
}

fn set_cookie_header(value: &str, max_age_secs: i64, secure: bool) -> ApiResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).map_err(|e| {
        ApiError::internal(&DentalError::Internal(e.to_string()), "Failed to create session")
    })
}

/// 注册请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 用户信息（不包含密码）
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
        }
    }
}

/// 注册规则：用户名至少 3 个字符，密码至少 6 个字符，邮箱需包含 '@'
pub fn check_registration(request: &RegisterRequest) -> ApiResult<NewUser> {
    let username = request.username.as_deref().map(str::trim).unwrap_or_default();
    let password = request.password.as_deref().unwrap_or_default();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }
    if username.chars().count() < 3 {
        return Err(ApiError::bad_request("Username must be at least 3 characters"));
    }
    if password.chars().count() < 6 {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email {
        if !email.contains('@') {
            return Err(ApiError::bad_request("Invalid email address"));
        }
    }

    Ok(NewUser {
        username: username.to_string(),
        password_hash: hash_password(password),
        email: email.map(str::to_string),
        full_name: request
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    })
}

fn parse_body<T: for<'de> Deserialize<'de>>(body: &Bytes) -> ApiResult<T> {
    serde_json::from_slice(body)
        .map_err(|_| ApiError::bad_request("Invalid request body").with_message_body())
}

async fn start_session(state: &AppState, user: User) -> ApiResult<Response> {
    let cookie_value = state.sessions.create(user.id).await;
    let cookie = set_cookie_header(
        &cookie_value,
        state.sessions.ttl().num_seconds(),
        state.auth.secure_cookies,
    )
    .map_err(ApiError::with_message_body)?;

    let mut response = Json(UserInfo::from(user)).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// 注册处理器，注册成功即登录
pub async fn register_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request: RegisterRequest = parse_body(&body)?;
    let new_user = check_registration(&request).map_err(ApiError::with_message_body)?;

    let user = state.users.create_user(new_user).await.map_err(|e| match e {
        DentalError::Validation { message, .. } => {
            ApiError::bad_request(message).with_message_body()
        }
        other => ApiError::internal(&other, "Failed to create user").with_message_body(),
    })?;

    info!("Registered user {} (id {})", user.username, user.id);
    start_session(&state, user).await
}

/// 登录处理器
pub async fn login_handler(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request: LoginRequest = parse_body(&body)?;
    let (username, password) = match (request.username.as_deref(), request.password.as_deref()) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
        _ => {
            return Err(
                ApiError::bad_request("Username and password are required").with_message_body()
            )
        }
    };

    let user = state
        .users
        .find_by_username(username)
        .await
        .map_err(|e| ApiError::internal(&e, "Login failed").with_message_body())?;

    match user {
        Some(user) if verify_password(password, &user.password_hash) => {
            info!("User logged in successfully: {}", user.username);
            start_session(&state, user).await
        }
        _ => {
            warn!("Login failed for user: {}", username);
            Err(ApiError::unauthorized("Invalid username or password").with_message_body())
        }
    }
}

/// 注销处理器
pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(cookie_value) = session_cookie(&headers) {
        state.sessions.destroy(&cookie_value).await;
    }

    let cookie = set_cookie_header("", 0, state.auth.secure_cookies)
        .map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Logout failed").with_message_body())?;
    let mut response = Json(json!({ "message": "Logged out successfully" })).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// 当前登录用户
pub async fn me_handler(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<UserInfo>> {
    let context = match session_cookie(&headers) {
        Some(value) => state.sessions.resolve(&value).await,
        None => None,
    };
    let context =
        context.ok_or_else(|| ApiError::unauthorized("Not authenticated").with_message_body())?;

    let user = state
        .users
        .find_by_id(context.user_id)
        .await
        .map_err(|e| ApiError::internal(&e, "Failed to fetch user").with_message_body())?
        .ok_or_else(|| ApiError::not_found("User not found").with_message_body())?;

    Ok(Json(UserInfo::from(user)))
}

/// 会话中间件：校验通过后把 SessionContext 放入请求扩展
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = match session_cookie(request.headers()) {
        Some(value) => state.sessions.resolve(&value).await,
        None => None,
    };

    match context {
        Some(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        None => ApiError::unauthorized("Unauthorized")
            .with_message_body()
            .into_response(),
    }
}

/// 按会话设置创建存储
pub fn session_store(settings: &AuthSettings) -> Arc<SessionStore> {
    Arc::new(SessionStore::new(
        settings.session_secret.clone(),
        settings.session_ttl,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let stored = hash_password("segredo123");
        assert!(stored.contains('$'));
        assert!(verify_password("segredo123", &stored));
        assert!(!verify_password("segredo124", &stored));
        assert!(!verify_password("segredo123", "malformed"));
        // 相同密码每次加盐不同
        assert_ne!(hash_password("segredo123"), stored);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = SessionStore::new("secret", Duration::hours(1));
        let cookie = store.create(7).await;

        assert_eq!(store.resolve(&cookie).await, Some(SessionContext { user_id: 7 }));

        store.destroy(&cookie).await;
        assert_eq!(store.resolve(&cookie).await, None);
    }

    #[tokio::test]
    async fn test_tampered_cookie_rejected() {
        let store = SessionStore::new("secret", Duration::hours(1));
        let cookie = store.create(7).await;

        let (id, _) = cookie.rsplit_once('.').unwrap();
        assert_eq!(store.resolve(&format!("{}.deadbeef", id)).await, None);
        assert_eq!(store.resolve(id).await, None);

        let other = SessionStore::new("other-secret", Duration::hours(1));
        assert_eq!(other.resolve(&cookie).await, None);
    }

    #[tokio::test]
    async fn test_expired_session_removed() {
        let store = SessionStore::new("secret", Duration::seconds(-1));
        let cookie = store.create(1).await;
        assert_eq!(store.resolve(&cookie).await, None);

        store.create(2).await;
        assert_eq!(store.purge_expired().await, 1);
    }

    #[test]
    fn test_session_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; dental.sid=abc.def ; other=1"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc.def"));

        let empty = HeaderMap::new();
        assert_eq!(session_cookie(&empty), None);
    }

    #[test]
    fn test_registration_rules() {
        let request = |username: &str, password: &str, email: Option<&str>| RegisterRequest {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            email: email.map(str::to_string),
            full_name: None,
        };

        assert!(check_registration(&request("ana", "123456", None)).is_ok());
        assert!(check_registration(&request("ana", "123456", Some("ana@lab.com"))).is_ok());

        let err = check_registration(&request("an", "123456", None)).unwrap_err();
        assert_eq!(err.message(), "Username must be at least 3 characters");
        let err = check_registration(&request("ana", "12345", None)).unwrap_err();
        assert_eq!(err.message(), "Password must be at least 6 characters");
        let err = check_registration(&request("ana", "123456", Some("ana.lab.com"))).unwrap_err();
        assert_eq!(err.message(), "Invalid email address");
        let err = check_registration(&request("", "123456", None)).unwrap_err();
        assert_eq!(err.message(), "Username and password are required");
    }
}
