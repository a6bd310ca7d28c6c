//! # 牙科订单管理模块
//!
//! 提供配置加载和日志初始化

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, AuthConfig, DatabaseConfig, LoggingConfig, ServerConfig, UploadConfig,
    DEFAULT_SESSION_SECRET,
};
pub use logging::init_logging;
