//! 核心数据模型定义

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DentalError;

/// 订单状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,    // 待处理
    InProgress, // 制作中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// 存储和接口使用的字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DentalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DentalError::InvalidStatus(other.to_string())),
        }
    }
}

/// 订单中选中的牙位
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToothReference {
    /// FDI 两位编号，例如 "11"
    pub number: String,
    /// 显示名称
    pub name: String,
    /// 订单内唯一标识
    pub id: String,
}

/// 工作类型（是否需要试戴）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    ComProva,
    SemProva,
}

/// 修复材料
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    Zirconia,
    Pmma,
    Dissilicato,
}

/// 比色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToothColor {
    A1,
    A2,
    A3,
    #[serde(rename = "BL1")]
    Bl1,
    #[serde(rename = "BL2")]
    Bl2,
    #[serde(rename = "BL3")]
    Bl3,
    #[serde(rename = "BL4")]
    Bl4,
}

impl ToothColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToothColor::A1 => "A1",
            ToothColor::A2 => "A2",
            ToothColor::A3 => "A3",
            ToothColor::Bl1 => "BL1",
            ToothColor::Bl2 => "BL2",
            ToothColor::Bl3 => "BL3",
            ToothColor::Bl4 => "BL4",
        }
    }
}

/// 工作类别，决定种植相关字段是否有意义
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkCategory {
    Faceta,
    Onlay,
    SobImplante,
    SobDente,
    PlacaMio,
}

/// 种植基台类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImplantType {
    #[serde(rename = "pilar_gt")]
    PilarGt,
    #[serde(rename = "munhao_universal_33x6")]
    MunhaoUniversal33x6,
    #[serde(rename = "munhao_universal_33x4")]
    MunhaoUniversal33x4,
    #[serde(rename = "he_41")]
    He41,
    #[serde(rename = "mini_pilar_sirona")]
    MiniPilarSirona,
}

/// 固位方式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FixationType {
    Unitaria,
    Protocolo,
}

/// 牙齿形态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToothShape {
    Redondo,
    Quadrado,
    Pontudo,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// 单颗牙的修复配置
///
/// 所有字段都是可选的；空配置也是合法的。未知字段会被拒绝。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToothConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooth_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooth_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<WorkType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Material>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ToothColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_category: Option<WorkCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implant_type: Option<ImplantType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixation_type: Option<FixationType>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_fixed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_teeth: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub mirror_tooth: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub standard_library: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooth_shape: Option<ToothShape>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub articulator: bool,
    #[serde(rename = "articulatorMM", default, skip_serializing_if = "Option::is_none")]
    pub articulator_mm: Option<f64>,
}

impl ToothConfiguration {
    /// 种植相关字段仅在 "sob_implante" 类别下有意义
    pub fn implant_fields_relevant(&self) -> bool {
        self.work_category == Some(WorkCategory::SobImplante)
    }

    pub fn is_empty(&self) -> bool {
        *self == ToothConfiguration::default()
    }
}

/// 经过验证、等待分配订单号的新订单
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewDentalOrder {
    pub patient_name: String,
    pub patient_id: Option<String>,
    pub selected_teeth: Vec<ToothReference>,
    pub tooth_configurations: BTreeMap<String, ToothConfiguration>,
    pub observations: Option<String>,
    pub smile_photo_path: Option<String>,
    pub scanner_file_path: Option<String>,
}

/// 牙科订单（聚合根）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DentalOrder {
    pub id: i32,
    pub order_number: String,
    pub patient_name: String,
    pub patient_id: Option<String>,
    pub selected_teeth: Vec<ToothReference>,
    pub tooth_configurations: BTreeMap<String, ToothConfiguration>,
    pub observations: Option<String>,
    pub smile_photo_path: Option<String>,
    pub scanner_file_path: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DentalOrder {
    /// 按选牙顺序返回牙位及其配置
    pub fn teeth_with_configurations(&self) -> Vec<(&ToothReference, Option<&ToothConfiguration>)> {
        self.selected_teeth
            .iter()
            .map(|tooth| (tooth, self.tooth_configurations.get(&tooth.id)))
            .collect()
    }
}

/// 订单列表过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub search_text: Option<String>,
}

impl OrderFilter {
    /// 判断订单是否满足过滤条件（状态精确匹配，文本不区分大小写）
    pub fn matches(&self, order: &DentalOrder) -> bool {
        if let Some(status) = self.status {
            if order.status != status {
                return false;
            }
        }

        match self.search_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                let needle = text.to_lowercase();
                let contains = |value: &str| value.to_lowercase().contains(&needle);
                contains(&order.order_number)
                    || contains(&order.patient_name)
                    || order.patient_id.as_deref().map(contains).unwrap_or(false)
            }
            _ => true,
        }
    }
}

/// 分页参数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

/// 分页查询结果
///
/// `total` 是全表订单数（不受过滤影响），`filtered_total` 是过滤后的数量。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPage {
    pub orders: Vec<DentalOrder>,
    pub total: i64,
    pub filtered_total: i64,
}

/// 系统用户
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 新用户（密码已哈希）
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(number: &str, name: &str, patient_id: Option<&str>, status: OrderStatus) -> DentalOrder {
        let now = Utc::now();
        DentalOrder {
            id: 1,
            order_number: number.to_string(),
            patient_name: name.to_string(),
            patient_id: patient_id.map(str::to_string),
            selected_teeth: vec![],
            tooth_configurations: BTreeMap::new(),
            observations: None,
            smile_photo_path: None,
            scanner_file_path: None,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        let err = "done".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, DentalError::InvalidStatus(ref s) if s == "done"));
        assert_eq!(serde_json::to_value(OrderStatus::InProgress).unwrap(), json!("in_progress"));
    }

    #[test]
    fn test_configuration_wire_names() {
        let config: ToothConfiguration = serde_json::from_value(json!({
            "workType": "com_prova",
            "material": "dissilicato",
            "color": "BL2",
            "workCategory": "sob_implante",
            "implantType": "munhao_universal_33x6",
            "fixationType": "protocolo",
            "isFixed": true,
            "connectedTeeth": "11-21",
            "articulator": true,
            "articulatorMM": 2.5
        }))
        .unwrap();

        assert_eq!(config.color, Some(ToothColor::Bl2));
        assert_eq!(config.implant_type, Some(ImplantType::MunhaoUniversal33x6));
        assert_eq!(config.articulator_mm, Some(2.5));
        assert!(config.implant_fields_relevant());

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["implantType"], json!("munhao_universal_33x6"));
        assert_eq!(value["articulatorMM"], json!(2.5));
        assert!(value.get("mirrorTooth").is_none());
    }

    #[test]
    fn test_configuration_rejects_unknown_fields() {
        let result: std::result::Result<ToothConfiguration, _> =
            serde_json::from_value(json!({ "implantBrand": "Neodent" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_filter_matches_status_and_text() {
        let maria = order("ORD-1-AAAAAAAAA", "Maria Silva", Some("P-77"), OrderStatus::Completed);
        let joao = order("ORD-2-BBBBBBBBB", "João Souza", None, OrderStatus::Completed);

        let filter = OrderFilter {
            status: Some(OrderStatus::Completed),
            search_text: Some("maria".to_string()),
        };
        assert!(filter.matches(&maria));
        assert!(!filter.matches(&joao));

        let by_patient_id = OrderFilter {
            status: None,
            search_text: Some("p-7".to_string()),
        };
        assert!(by_patient_id.matches(&maria));

        let by_number = OrderFilter {
            status: Some(OrderStatus::Pending),
            search_text: Some("bbbb".to_string()),
        };
        assert!(!by_number.matches(&joao));
    }
}
