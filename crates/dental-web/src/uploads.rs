//! 文件上传处理器

use axum::{
    extract::{multipart::MultipartError, Extension, Multipart, State},
    http::StatusCode,
    response::Json,
};
use dental_core::DentalError;
use dental_storage::{UploadKind, NO_FILE_MESSAGE};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::SessionContext;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

/// 上传笑容照片
pub async fn upload_smile_photo(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    receive(&state, session, UploadKind::SmilePhoto, multipart).await
}

/// 上传口扫文件
pub async fn upload_scanner_file(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    receive(&state, session, UploadKind::ScannerFile, multipart).await
}

async fn receive(
    state: &AppState,
    session: SessionContext,
    kind: UploadKind,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let store = &state.uploads;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(state, kind, e))?
    {
        if field.name() != Some(kind.field_name()) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);

        // 类型不符时不读取文件内容
        store
            .check(kind, &file_name, content_type.as_deref(), 0)
            .map_err(|e| rejected(kind, e))?;

        let mut data = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| multipart_error(state, kind, e))?
        {
            data.extend_from_slice(&chunk);
            if data.len() as u64 > store.max_file_size() {
                return Err(rejected(kind, store.too_large(kind)));
            }
        }

        let upload = store
            .store(kind, &file_name, content_type.as_deref(), &data)
            .await
            .map_err(|e| match e {
                DentalError::Validation { .. } => rejected(kind, e),
                other => ApiError::internal(&other, kind.failure_message()),
            })?;

        info!(
            "User {} uploaded {} as {}",
            session.user_id, upload.file_name, upload.file_path
        );
        return Ok(Json(json!({
            "success": true,
            "filePath": upload.file_path,
            "fileName": upload.file_name
        })));
    }

    Err(ApiError::bad_request(NO_FILE_MESSAGE))
}

fn rejected(kind: UploadKind, err: DentalError) -> ApiError {
    warn!("Rejected {} upload: {}", kind.field_name(), err);
    ApiError::from_dental(err, kind.failure_message())
}

fn multipart_error(state: &AppState, kind: UploadKind, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return rejected(kind, state.uploads.too_large(kind));
    }
    warn!("Malformed {} upload: {}", kind.field_name(), err);
    ApiError::bad_request(err.body_text())
}

#[cfg(test)]
mod tests {
    use crate::server::create_app;
    use crate::server::test_support::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};

    const BOUNDARY: &str = "dental-boundary";

    fn multipart_request(
        uri: &str,
        cookie: Option<&str>,
        field: &str,
        file_name: &str,
        content_type: &str,
        data: &[u8],
    ) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"{n}\"\r\n\
                 Content-Type: {c}\r\n\r\n",
                b = BOUNDARY,
                f = field,
                n = file_name,
                c = content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_upload_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()));

        let request = multipart_request(
            "/api/upload/smile-photo",
            None,
            "smilePhoto",
            "sorriso.jpg",
            "image/jpeg",
            b"jpeg",
        );
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_upload_and_serve() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()));
        let cookie = login_cookie(&app).await;

        let request = multipart_request(
            "/api/upload/scanner-file",
            Some(&cookie),
            "scannerFile",
            "arcada.stl",
            "application/octet-stream",
            b"solid arcada",
        );
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["fileName"], "arcada.stl");
        let file_path = body["filePath"].as_str().unwrap().to_string();
        assert!(file_path.starts_with("/uploads/scanner-files/"));
        assert!(file_path.ends_with(".stl"));

        let (status, _, data) = send(&app, get_request(&file_path)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_ne!(data, b"solid arcada");

        let request = Request::builder()
            .uri(&file_path)
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap();
        let (status, _, data) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(data, b"solid arcada");
    }

    #[tokio::test]
    async fn test_serve_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        std::fs::create_dir_all(uploads.join("scanner-files")).unwrap();
        std::fs::write(dir.path().join("segredo.txt"), b"segredo").unwrap();
        let app = create_app(test_state(&uploads));
        let cookie = login_cookie(&app).await;

        for path in [
            "/uploads/../segredo.txt",
            "/uploads/scanner-files/../../segredo.txt",
            "/uploads/scanner-files/%2e%2e/%2e%2e/segredo.txt",
            "/uploads/scanner-files/faltando.stl",
        ] {
            let request = Request::builder()
                .uri(path)
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap();
            let (status, _, data) = send(&app, request).await;
            assert_ne!(status, StatusCode::OK, "{}", path);
            assert_ne!(data, b"segredo", "{}", path);
        }
    }

    #[tokio::test]
    async fn test_upload_type_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()));
        let cookie = login_cookie(&app).await;

        let request = multipart_request(
            "/api/upload/smile-photo",
            Some(&cookie),
            "smilePhoto",
            "laudo.pdf",
            "application/pdf",
            b"%PDF",
        );
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Apenas imagens são permitidas para foto do sorriso");

        let request = multipart_request(
            "/api/upload/scanner-file",
            Some(&cookie),
            "scannerFile",
            "modelo.dwg",
            "application/acad",
            b"AC1027",
        );
        let (status, _) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!dir.path().join("scanner-files").exists());
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()));
        let cookie = login_cookie(&app).await;

        let request = multipart_request(
            "/api/upload/smile-photo",
            Some(&cookie),
            "otherField",
            "sorriso.jpg",
            "image/jpeg",
            b"jpeg",
        );
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Nenhum arquivo foi enviado");
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_app(test_state(dir.path()));
        let cookie = login_cookie(&app).await;

        let data = vec![0u8; (2 * MIB + 1) as usize];
        let request = multipart_request(
            "/api/upload/scanner-file",
            Some(&cookie),
            "scannerFile",
            "grande.stl",
            "application/octet-stream",
            &data,
        );
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Arquivo muito grande. Tamanho máximo: 2MB");
    }
}
