//! # 牙科订单 Web 模块
//!
//! 提供订单、认证和文件上传的 HTTP 接口。

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod uploads;

pub use auth::{AuthSettings, SessionContext, SessionStore, SESSION_COOKIE};
pub use error::{ApiError, ApiResult};
pub use server::{create_app, AppState, WebServer};
