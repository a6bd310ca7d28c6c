//! HTTP处理器

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use chrono::Local;
use dental_core::{DentalError, OrderFilter, OrderStatus, Pagination};
use dental_report::{document_file_name, to_pdf_bytes, DocumentInput, RenderedDocument};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

const DEFAULT_LIMIT: i64 = 50;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "Dental Lab Order API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "orders": "/api/dental-orders",
            "auth": "/api/auth",
            "uploads": "/api/upload"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 订单列表查询参数
#[derive(Debug, Deserialize)]
pub struct OrderQueryParams {
    pub status: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl OrderQueryParams {
    /// 空字符串视为未提供
    fn filter(&self) -> ApiResult<OrderFilter> {
        let status = match self.status.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(
                raw.parse::<OrderStatus>()
                    .map_err(|_| ApiError::bad_request("Invalid status"))?,
            ),
            _ => None,
        };
        let search_text = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(OrderFilter {
            status,
            search_text,
        })
    }

    fn pagination(&self) -> ApiResult<Pagination> {
        Ok(Pagination {
            limit: parse_non_negative(self.limit.as_deref(), DEFAULT_LIMIT, "limit")?,
            offset: parse_non_negative(self.offset.as_deref(), 0, "offset")?,
        })
    }
}

fn parse_non_negative(raw: Option<&str>, default: i64, name: &str) -> ApiResult<i64> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<i64>()
            .ok()
            .filter(|v| *v >= 0)
            .ok_or_else(|| ApiError::bad_request(format!("Invalid {} parameter", name))),
    }
}

fn parse_order_id(raw: &str) -> ApiResult<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ApiError::not_found("Order not found"))
}

fn parse_json(body: &Bytes) -> ApiResult<Value> {
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid JSON body"))
}

/// 创建订单
pub async fn create_order(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<Value>> {
    let payload = parse_json(&body)?;
    let order = state
        .orders
        .create_order(&payload)
        .await
        .map_err(|e| ApiError::from_dental(e, "Failed to create dental order"))?;

    Ok(Json(json!({ "success": true, "order": order })))
}

/// 订单列表
pub async fn list_orders(
    State(state): State<AppState>,
    Query(params): Query<OrderQueryParams>,
) -> ApiResult<Json<Value>> {
    let filter = params.filter()?;
    let pagination = params.pagination()?;

    let page = state
        .orders
        .list_orders(&filter, pagination)
        .await
        .map_err(|e| ApiError::internal(&e, "Failed to fetch dental orders"))?;

    debug!(
        "Listed {} of {} dental orders",
        page.orders.len(),
        page.filtered_total
    );

    Ok(Json(json!({
        "success": true,
        "orders": page.orders,
        "total": page.total,
        "filteredTotal": page.filtered_total,
        "limit": pagination.limit,
        "offset": pagination.offset
    })))
}

/// 订单详情
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_order_id(&id)?;
    let order = state
        .orders
        .get_order(id)
        .await
        .map_err(|e| ApiError::from_dental(e, "Failed to fetch dental order"))?;

    Ok(Json(json!({ "success": true, "order": order })))
}

/// 更新订单状态
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let id = parse_order_id(&id)?;
    let payload = parse_json(&body)?;
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Invalid status"))?;

    let order = state
        .orders
        .update_status(id, status)
        .await
        .map_err(|e| ApiError::from_dental(e, "Failed to update order status"))?;

    Ok(Json(json!({ "success": true, "order": order })))
}

/// 各状态订单数量
pub async fn order_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let counts = state
        .orders
        .status_counts()
        .await
        .map_err(|e| ApiError::internal(&e, "Failed to fetch order statistics"))?;

    let total: i64 = counts.values().sum();
    let stats: Map<String, Value> = counts
        .into_iter()
        .map(|(status, count)| (status.as_str().to_string(), json!(count)))
        .collect();

    Ok(Json(json!({ "success": true, "stats": stats, "total": total })))
}

/// 下载已保存订单的文档
pub async fn order_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_order_id(&id)?;
    let order = state
        .orders
        .get_order(id)
        .await
        .map_err(|e| ApiError::from_dental(e, "Failed to generate document"))?;

    let now = Local::now();
    let document = state
        .renderer
        .render(&DocumentInput::from_order(&order, now.naive_local()));
    let file_name = document_file_name(
        &order.patient_name,
        order.patient_id.as_deref(),
        now.date_naive(),
    );
    pdf_response(&document, &file_name)
}

/// 预览尚未保存的表单内容
pub async fn preview_document(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let payload = parse_json(&body)?;
    let draft = state.orders.validator().validate(&payload).map_err(|e| {
        warn!("Rejected document preview: {}", e);
        ApiError::from_dental(e, "Failed to generate document")
    })?;

    let now = Local::now();
    let document = state
        .renderer
        .render(&DocumentInput::from_draft(&draft, now.naive_local()));
    let file_name = document_file_name(
        &draft.patient_name,
        draft.patient_id.as_deref(),
        now.date_naive(),
    );
    pdf_response(&document, &file_name)
}

fn pdf_response(document: &RenderedDocument, file_name: &str) -> ApiResult<Response> {
    let bytes = to_pdf_bytes(document)
        .map_err(|e: DentalError| ApiError::internal(&e, "Failed to generate document"))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(file_name)),
        ],
        bytes,
    )
        .into_response())
}

/// ASCII 文件名加 RFC 5987 编码的 UTF-8 文件名
pub fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '_' })
        .collect();

    let mut encoded = String::new();
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-_.~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii, encoded
    )
}
