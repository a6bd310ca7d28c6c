//! # Dental Core
//!
//! 牙科技工订单系统的核心模块，提供数据模型、错误定义、订单验证和订单号生成。

pub mod catalog;
pub mod error;
pub mod models;
pub mod utils;
pub mod validation;

pub use error::{DentalError, Result};
pub use models::*;
pub use validation::{validate_tooth_configuration, OrderValidator};
