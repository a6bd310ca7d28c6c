//! 数据库模型

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dental_core::{
    DentalError, DentalOrder, OrderStatus, Result, ToothConfiguration, ToothReference, User,
};
use sqlx::types::Json;
use sqlx::FromRow;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库订单表
#[derive(Debug, FromRow)]
pub struct DbDentalOrder {
    pub id: i32,
    pub order_number: String,
    pub patient_name: String,
    pub patient_id: Option<String>,
    pub selected_teeth: Json<Vec<ToothReference>>,
    pub tooth_configurations: Json<BTreeMap<String, ToothConfiguration>>,
    pub observations: Option<String>,
    pub smile_photo_path: Option<String>,
    pub scanner_file_path: Option<String>,
    pub status: String, // 存储为字符串，转换为OrderStatus枚举
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbDentalOrder> for DentalOrder {
    type Error = DentalError;

    fn try_from(row: DbDentalOrder) -> Result<Self> {
        let status = parse_stored_status(&row.status)?;

        Ok(DentalOrder {
            id: row.id,
            order_number: row.order_number,
            patient_name: row.patient_name,
            patient_id: row.patient_id,
            selected_teeth: row.selected_teeth.0,
            tooth_configurations: row.tooth_configurations.0,
            observations: row.observations,
            smile_photo_path: row.smile_photo_path,
            scanner_file_path: row.scanner_file_path,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// 表中出现枚举外的状态说明数据已损坏，按存储错误处理
pub fn parse_stored_status(value: &str) -> Result<OrderStatus> {
    value
        .parse::<OrderStatus>()
        .map_err(|_| DentalError::Storage(format!("unknown status stored in database: {}", value)))
}

/// 数据库用户表
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: i32,
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(row: DbUser) -> Self {
        User {
            id: row.id,
            username: row.username,
            password_hash: row.password,
            email: row.email,
            full_name: row.full_name,
            created_at: row.created_at,
        }
    }
}

/// 状态统计行
#[derive(Debug, FromRow)]
pub struct DbStatusCount {
    pub status: String,
    pub count: i64,
}
