//! 错误定义模块

use thiserror::Error;

/// 牙科订单系统统一错误类型
#[derive(Error, Debug)]
pub enum DentalError {
    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效订单状态: {0}")]
    InvalidStatus(String),

    #[error("订单号重复: {0}")]
    DuplicateOrderNumber(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("未授权: {0}")]
    Unauthorized(String),

    #[error("文档渲染错误: {0}")]
    Render(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl DentalError {
    /// 构造字段级验证错误
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DentalError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 出错的字段名（仅验证错误）
    pub fn field(&self) -> Option<&str> {
        match self {
            DentalError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    /// 重新生成订单号后可以重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, DentalError::DuplicateOrderNumber(_))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for DentalError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DentalError::NotFound("row not found".to_string()),
            _ => DentalError::Storage(err.to_string()),
        }
    }
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, DentalError>;
