//! # 牙科订单存储模块
//!
//! 负责笑容照片和口扫文件的上传存储。

pub mod storage;

pub use storage::{
    extension_of, StoredUpload, UploadKind, UploadStore, NO_FILE_MESSAGE, PUBLIC_PREFIX,
    SCANNER_EXTENSIONS,
};
