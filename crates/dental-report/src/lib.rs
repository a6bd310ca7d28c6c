//! # 牙科订单文档模块
//!
//! 把订单渲染成可打印的分页文档：
//! - 枚举值到葡萄牙语标签的映射
//! - A4 排版与分页，页脚在排版完成后统一添加
//! - PDF 输出与下载文件命名
//! - 从文档文字读回订单的关键字段

pub mod labels;
pub mod layout;
pub mod naming;
pub mod pdf;
pub mod summary;

pub use layout::{DocumentInput, DocumentRenderer, Page, RenderedDocument, TextLine};
pub use naming::document_file_name;
pub use pdf::to_pdf_bytes;
pub use summary::DocumentSummary;
