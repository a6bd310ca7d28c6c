//! HTTP 错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dental_core::DentalError;
use serde_json::json;

/// 响应体格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ErrorBody {
    /// 订单和上传接口：`{success:false, error}`
    Envelope,
    /// 认证接口：`{message}`
    Message,
}

/// 返回给客户端的错误，只携带简短的提示信息
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: ErrorBody::Envelope,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// 内部错误只记录日志，客户端看到固定提示
    pub fn internal(err: &DentalError, message: &'static str) -> Self {
        tracing::error!("{}: {}", message, err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// 按错误类别映射状态码，fallback 为 500 时使用的提示
    pub fn from_dental(err: DentalError, fallback: &'static str) -> Self {
        match err {
            DentalError::Validation { message, .. } => Self::bad_request(message),
            DentalError::InvalidStatus(_) => Self::bad_request("Invalid status"),
            DentalError::NotFound(_) => Self::not_found("Order not found"),
            DentalError::Unauthorized(message) => Self::unauthorized(message),
            other => Self::internal(&other, fallback),
        }
    }

    /// 改用 `{message}` 格式的响应体
    pub fn with_message_body(mut self) -> Self {
        self.body = ErrorBody::Message;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.body {
            ErrorBody::Envelope => json!({ "success": false, "error": self.message }),
            ErrorBody::Message => json!({ "message": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DentalError::validation("patientName", "Patient name is required"), StatusCode::BAD_REQUEST),
            (DentalError::InvalidStatus("done".into()), StatusCode::BAD_REQUEST),
            (DentalError::NotFound("Order 1 not found".into()), StatusCode::NOT_FOUND),
            (DentalError::Unauthorized("Unauthorized".into()), StatusCode::UNAUTHORIZED),
            (DentalError::Storage("connection reset".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DentalError::DuplicateOrderNumber("ORD-1-X".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from_dental(err, "Failed").status(), status);
        }
    }

    #[test]
    fn test_internal_detail_hidden() {
        let err = ApiError::from_dental(
            DentalError::Storage("password authentication failed for user".into()),
            "Failed to create dental order",
        );
        assert_eq!(err.message(), "Failed to create dental order");
    }

    #[test]
    fn test_validation_message_passed_through() {
        let err = ApiError::from_dental(
            DentalError::validation("selectedTeeth", "At least one tooth must be selected"),
            "Failed",
        );
        assert_eq!(err.message(), "At least one tooth must be selected");
    }
}
