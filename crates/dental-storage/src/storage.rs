//! 上传文件存储
//!
//! 笑容照片和口扫文件按类别存放在上传根目录下的子目录中，
//! 文件名由时间戳和随机数生成，只保留原文件的扩展名。

use std::path::{Path, PathBuf};

use chrono::Utc;
use dental_core::{DentalError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// 对外访问上传文件的 URL 前缀
pub const PUBLIC_PREFIX: &str = "/uploads";

/// 口扫文件允许的扩展名（不区分大小写）
pub const SCANNER_EXTENSIONS: [&str; 4] = [".stl", ".obj", ".ply", ".zip"];

pub const NO_FILE_MESSAGE: &str = "Nenhum arquivo foi enviado";

/// 上传类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadKind {
    SmilePhoto,
    ScannerFile,
}

impl UploadKind {
    /// multipart 表单字段名
    pub fn field_name(&self) -> &'static str {
        match self {
            UploadKind::SmilePhoto => "smilePhoto",
            UploadKind::ScannerFile => "scannerFile",
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            UploadKind::SmilePhoto => "smile-photos",
            UploadKind::ScannerFile => "scanner-files",
        }
    }

    /// 存储失败时返回给客户端的提示
    pub fn failure_message(&self) -> &'static str {
        match self {
            UploadKind::SmilePhoto => "Erro ao fazer upload da foto",
            UploadKind::ScannerFile => "Erro ao fazer upload do arquivo",
        }
    }

    fn check_type(&self, original_name: &str, content_type: Option<&str>) -> Result<()> {
        match self {
            UploadKind::SmilePhoto => {
                let is_image = content_type
                    .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
                    .unwrap_or(false);
                if !is_image {
                    return Err(DentalError::validation(
                        self.field_name(),
                        "Apenas imagens são permitidas para foto do sorriso",
                    ));
                }
            }
            UploadKind::ScannerFile => {
                let ext = extension_of(original_name).to_ascii_lowercase();
                if !SCANNER_EXTENSIONS.contains(&ext.as_str()) {
                    return Err(DentalError::validation(
                        self.field_name(),
                        "Apenas arquivos STL, OBJ, PLY ou ZIP são permitidos",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// 已保存的上传文件
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    pub kind: UploadKind,
    /// 可以写入订单 smilePhotoPath / scannerFilePath 的访问路径
    pub file_path: String,
    /// 客户端提交的原始文件名
    pub file_name: String,
    #[serde(skip)]
    pub disk_path: PathBuf,
    pub size: u64,
    pub checksum: String,
}

/// 上传存储
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_file_size: u64,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            root: root.into(),
            max_file_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// 写盘前的类型和大小检查
    pub fn check(
        &self,
        kind: UploadKind,
        original_name: &str,
        content_type: Option<&str>,
        size: u64,
    ) -> Result<()> {
        kind.check_type(original_name, content_type)?;
        if size > self.max_file_size {
            return Err(self.too_large(kind));
        }
        Ok(())
    }

    pub fn too_large(&self, kind: UploadKind) -> DentalError {
        DentalError::validation(
            kind.field_name(),
            format!(
                "Arquivo muito grande. Tamanho máximo: {}MB",
                self.max_file_size / (1024 * 1024)
            ),
        )
    }

    /// 检查并保存上传文件
    pub async fn store(
        &self,
        kind: UploadKind,
        original_name: &str,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<StoredUpload> {
        self.check(kind, original_name, content_type, data.len() as u64)?;

        let dir = self.root.join(kind.dir_name());
        tokio::fs::create_dir_all(&dir).await?;

        let stored_name = stored_file_name(
            Utc::now().timestamp_millis(),
            random_nine_digits(),
            &extension_of(original_name),
        );
        let disk_path = dir.join(&stored_name);
        tokio::fs::write(&disk_path, data).await?;

        let upload = StoredUpload {
            kind,
            file_path: format!("{}/{}/{}", PUBLIC_PREFIX, kind.dir_name(), stored_name),
            file_name: original_name.to_string(),
            disk_path,
            size: data.len() as u64,
            checksum: calculate_checksum(data),
        };

        tracing::info!(
            "Stored {} upload {} ({} bytes, sha256 {})",
            kind.field_name(),
            upload.file_path,
            upload.size,
            upload.checksum
        );
        Ok(upload)
    }
}

/// 与常见 `extname` 行为一致：最后一个点及其后的部分；
/// 扩展名含非字母数字字符时丢弃
pub fn extension_of(original_name: &str) -> String {
    let base = original_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original_name);
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(pos) => {
            let ext = &base[pos..];
            if ext[1..].chars().all(|c| c.is_ascii_alphanumeric()) {
                ext.to_string()
            } else {
                String::new()
            }
        }
    }
}

/// `<毫秒时间戳>-<9位随机数><扩展名>`
pub fn stored_file_name(epoch_millis: i64, random: u32, extension: &str) -> String {
    format!("{}-{:09}{}", epoch_millis, random % 1_000_000_000, extension)
}

fn random_nine_digits() -> u32 {
    (uuid::Uuid::new_v4().as_u128() % 1_000_000_000) as u32
}

fn calculate_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
