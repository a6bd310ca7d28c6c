//! 订单数据验证
//!
//! 校验提交的原始 JSON 数据，生成类型化的 [`NewDentalOrder`]。
//! 只返回第一个错误，与表单逐条提示的行为一致。

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::is_fdi_code;
use crate::error::{DentalError, Result};
use crate::models::{NewDentalOrder, ToothConfiguration, ToothReference};
use crate::utils::non_blank;

pub const FIELD_PATIENT_NAME: &str = "patientName";
pub const FIELD_PATIENT_ID: &str = "patientId";
pub const FIELD_SELECTED_TEETH: &str = "selectedTeeth";
pub const FIELD_TOOTH_CONFIGURATIONS: &str = "toothConfigurations";
pub const FIELD_OBSERVATIONS: &str = "observations";
pub const FIELD_SMILE_PHOTO_PATH: &str = "smilePhotoPath";
pub const FIELD_SCANNER_FILE_PATH: &str = "scannerFilePath";

/// 校验单颗牙配置
///
/// 未知字段和枚举外取值会被拒绝；`articulatorMM` 必须是非负有限数。
/// 空对象总是合法的。
pub fn validate_tooth_configuration(raw: &Value) -> Result<ToothConfiguration> {
    if !raw.is_object() {
        return Err(DentalError::validation(
            FIELD_TOOTH_CONFIGURATIONS,
            "Tooth configuration must be an object",
        ));
    }

    let config: ToothConfiguration = serde_json::from_value(raw.clone()).map_err(|e| {
        DentalError::validation(
            FIELD_TOOTH_CONFIGURATIONS,
            format!("Invalid tooth configuration: {}", e),
        )
    })?;

    check_tooth_configuration(&config)?;
    Ok(config)
}

/// 对已反序列化的配置做数值约束检查
pub fn check_tooth_configuration(config: &ToothConfiguration) -> Result<()> {
    if let Some(mm) = config.articulator_mm {
        if !mm.is_finite() || mm < 0.0 {
            return Err(DentalError::validation(
                FIELD_TOOTH_CONFIGURATIONS,
                "articulatorMM must be a non-negative number",
            ));
        }
    }
    Ok(())
}

/// 订单验证器
#[derive(Debug, Default, Clone)]
pub struct OrderValidator;

impl OrderValidator {
    pub fn new() -> Self {
        Self
    }

    /// 校验原始提交数据
    ///
    /// 顶层未知字段（如客户端附带的 `timestamp`、`status`）会被忽略。
    pub fn validate(&self, payload: &Value) -> Result<NewDentalOrder> {
        let body = payload.as_object().ok_or_else(|| {
            DentalError::validation("body", "Request body must be a JSON object")
        })?;

        let patient_name = self.validate_patient_name(body)?;
        let patient_id = optional_string(body, FIELD_PATIENT_ID)?;
        if let Some(id) = &patient_id {
            check_single_line(FIELD_PATIENT_ID, id)?;
        }
        let selected_teeth = self.validate_selected_teeth(body)?;
        let tooth_configurations = self.validate_configurations(body, &selected_teeth)?;
        let observations = optional_string(body, FIELD_OBSERVATIONS)?;
        let smile_photo_path = optional_string(body, FIELD_SMILE_PHOTO_PATH)?;
        let scanner_file_path = optional_string(body, FIELD_SCANNER_FILE_PATH)?;

        debug!(
            "订单数据验证通过: {} 颗牙, {} 项配置",
            selected_teeth.len(),
            tooth_configurations.len()
        );

        Ok(NewDentalOrder {
            patient_name,
            patient_id,
            selected_teeth,
            tooth_configurations,
            observations,
            smile_photo_path,
            scanner_file_path,
        })
    }

    /// 对已类型化的请求重新检查结构约束（存储层的二次防护）
    pub fn check(&self, order: &NewDentalOrder) -> Result<()> {
        if order.patient_name.trim().is_empty() {
            return Err(patient_name_required());
        }
        check_single_line(FIELD_PATIENT_NAME, &order.patient_name)?;
        if let Some(id) = &order.patient_id {
            check_single_line(FIELD_PATIENT_ID, id)?;
        }
        check_teeth(&order.selected_teeth)?;
        for (tooth_id, config) in &order.tooth_configurations {
            if !order.selected_teeth.iter().any(|t| &t.id == tooth_id) {
                return Err(unknown_configuration_key(tooth_id));
            }
            check_tooth_configuration(config)?;
        }
        Ok(())
    }

    fn validate_patient_name(&self, body: &Map<String, Value>) -> Result<String> {
        match body.get(FIELD_PATIENT_NAME) {
            Some(Value::String(name)) if !name.trim().is_empty() => {
                let name = name.trim();
                check_single_line(FIELD_PATIENT_NAME, name)?;
                Ok(name.to_string())
            }
            Some(Value::String(_)) | Some(Value::Null) | None => Err(patient_name_required()),
            Some(_) => Err(DentalError::validation(
                FIELD_PATIENT_NAME,
                "Patient name must be a string",
            )),
        }
    }

    fn validate_selected_teeth(&self, body: &Map<String, Value>) -> Result<Vec<ToothReference>> {
        let items = match body.get(FIELD_SELECTED_TEETH) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Err(no_teeth_selected()),
            Some(_) => {
                return Err(DentalError::validation(
                    FIELD_SELECTED_TEETH,
                    "selectedTeeth must be an array",
                ))
            }
        };

        let teeth = items
            .iter()
            .map(|item| {
                serde_json::from_value::<ToothReference>(item.clone()).map_err(|_| {
                    DentalError::validation(
                        FIELD_SELECTED_TEETH,
                        "Each tooth must have number, name and id",
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        check_teeth(&teeth)?;
        Ok(teeth)
    }

    fn validate_configurations(
        &self,
        body: &Map<String, Value>,
        teeth: &[ToothReference],
    ) -> Result<BTreeMap<String, ToothConfiguration>> {
        let entries = match body.get(FIELD_TOOTH_CONFIGURATIONS) {
            Some(Value::Object(entries)) => entries,
            Some(Value::Null) | None => return Ok(BTreeMap::new()),
            Some(_) => {
                return Err(DentalError::validation(
                    FIELD_TOOTH_CONFIGURATIONS,
                    "toothConfigurations must be an object",
                ))
            }
        };

        let mut configurations = BTreeMap::new();
        for (tooth_id, raw) in entries {
            if !teeth.iter().any(|t| &t.id == tooth_id) {
                return Err(unknown_configuration_key(tooth_id));
            }
            let config = validate_tooth_configuration(raw)?;
            configurations.insert(tooth_id.clone(), config);
        }
        Ok(configurations)
    }
}

fn check_teeth(teeth: &[ToothReference]) -> Result<()> {
    if teeth.is_empty() {
        return Err(no_teeth_selected());
    }

    let mut ids = HashSet::new();
    let mut numbers = HashSet::new();
    for tooth in teeth {
        if tooth.number.trim().is_empty() || tooth.name.trim().is_empty() || tooth.id.trim().is_empty() {
            return Err(DentalError::validation(
                FIELD_SELECTED_TEETH,
                "Each tooth must have number, name and id",
            ));
        }
        if !is_fdi_code(&tooth.number) {
            return Err(DentalError::validation(
                FIELD_SELECTED_TEETH,
                format!("Invalid tooth number: {}", tooth.number),
            ));
        }
        if !ids.insert(tooth.id.as_str()) {
            return Err(DentalError::validation(
                FIELD_SELECTED_TEETH,
                format!("Duplicate tooth id: {}", tooth.id),
            ));
        }
        if !numbers.insert(tooth.number.as_str()) {
            return Err(DentalError::validation(
                FIELD_SELECTED_TEETH,
                format!("Tooth {} was selected more than once", tooth.number),
            ));
        }
    }
    Ok(())
}

fn optional_string(body: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    match body.get(field) {
        Some(Value::String(value)) => Ok(non_blank(Some(value.clone()))),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(DentalError::validation(
            field,
            format!("{} must be a string", field),
        )),
    }
}

/// 姓名和 ID 在文档中各占一个字段，不能含换行等控制字符
fn check_single_line(field: &str, value: &str) -> Result<()> {
    if value.chars().any(char::is_control) {
        return Err(DentalError::validation(
            field,
            format!("{} must not contain line breaks or control characters", field),
        ));
    }
    Ok(())
}

fn patient_name_required() -> DentalError {
    DentalError::validation(FIELD_PATIENT_NAME, "Patient name is required")
}

fn no_teeth_selected() -> DentalError {
    DentalError::validation(FIELD_SELECTED_TEETH, "At least one tooth must be selected")
}

fn unknown_configuration_key(tooth_id: &str) -> DentalError {
    DentalError::validation(
        FIELD_TOOTH_CONFIGURATIONS,
        format!("Configuration references unknown tooth: {}", tooth_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Material, WorkCategory};
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "patientName": "Maria Silva",
            "patientId": "P-001",
            "selectedTeeth": [
                { "number": "11", "name": "11 - Incisivo Central", "id": "tooth_11_1" },
                { "number": "21", "name": "21 - Incisivo Central", "id": "tooth_21_2" }
            ],
            "toothConfigurations": {
                "tooth_11_1": { "material": "zirconia", "workCategory": "sob_dente" }
            },
            "observations": "Urgente",
            "timestamp": "2024-01-01T00:00:00Z"
        })
    }

    fn field_of(result: Result<NewDentalOrder>) -> String {
        result.unwrap_err().field().unwrap_or_default().to_string()
    }

    #[test]
    fn test_valid_payload() {
        let order = OrderValidator::new().validate(&payload()).unwrap();
        assert_eq!(order.patient_name, "Maria Silva");
        assert_eq!(order.patient_id.as_deref(), Some("P-001"));
        assert_eq!(order.selected_teeth.len(), 2);
        assert_eq!(order.selected_teeth[0].number, "11");
        let config = &order.tooth_configurations["tooth_11_1"];
        assert_eq!(config.material, Some(Material::Zirconia));
        assert_eq!(config.work_category, Some(WorkCategory::SobDente));
        assert_eq!(order.observations.as_deref(), Some("Urgente"));
    }

    #[test]
    fn test_blank_patient_name_rejected() {
        let validator = OrderValidator::new();
        for name in [json!(""), json!("   \t"), Value::Null] {
            let mut body = payload();
            body["patientName"] = name;
            assert_eq!(field_of(validator.validate(&body)), FIELD_PATIENT_NAME);
        }

        let mut body = payload();
        body.as_object_mut().unwrap().remove("patientName");
        assert_eq!(field_of(validator.validate(&body)), FIELD_PATIENT_NAME);
    }

    #[test]
    fn test_line_breaks_in_patient_fields_rejected() {
        let validator = OrderValidator::new();
        for name in ["Maria\nSilva", "Maria\r\nSilva", "Maria\tSilva", "Maria\u{1b}Silva"] {
            let mut body = payload();
            body["patientName"] = json!(name);
            let err = validator.validate(&body).unwrap_err();
            assert_eq!(err.field(), Some(FIELD_PATIENT_NAME));
            assert!(err.to_string().contains("line breaks"));
        }

        let mut body = payload();
        body["patientId"] = json!("P-1\nP-2");
        assert_eq!(field_of(validator.validate(&body)), FIELD_PATIENT_ID);

        // 首尾的换行会被修剪掉
        let mut body = payload();
        body["patientName"] = json!("\nMaria Silva\n");
        let order = validator.validate(&body).unwrap();
        assert_eq!(order.patient_name, "Maria Silva");

        let mut order = validator.validate(&payload()).unwrap();
        order.patient_name = "Maria\nSilva".to_string();
        let err = validator.check(&order).unwrap_err();
        assert_eq!(err.field(), Some(FIELD_PATIENT_NAME));
    }

    #[test]
    fn test_empty_teeth_rejected() {
        let mut body = payload();
        body["selectedTeeth"] = json!([]);
        body["toothConfigurations"] = json!({});
        let err = OrderValidator::new().validate(&body).unwrap_err();
        assert_eq!(err.field(), Some(FIELD_SELECTED_TEETH));
        assert!(err.to_string().contains("tooth"));
    }

    #[test]
    fn test_first_error_wins() {
        let body = json!({ "patientName": "", "selectedTeeth": [] });
        assert_eq!(field_of(OrderValidator::new().validate(&body)), FIELD_PATIENT_NAME);
    }

    #[test]
    fn test_tooth_fields_required_and_unique() {
        let validator = OrderValidator::new();

        let mut body = payload();
        body["selectedTeeth"][0]["name"] = json!("");
        assert_eq!(field_of(validator.validate(&body)), FIELD_SELECTED_TEETH);

        let mut body = payload();
        body["selectedTeeth"][1]["id"] = json!("tooth_11_1");
        assert_eq!(field_of(validator.validate(&body)), FIELD_SELECTED_TEETH);

        let mut body = payload();
        body["selectedTeeth"][1]["number"] = json!("11");
        assert_eq!(field_of(validator.validate(&body)), FIELD_SELECTED_TEETH);

        let mut body = payload();
        body["selectedTeeth"][1] = json!({ "number": "21" });
        assert_eq!(field_of(validator.validate(&body)), FIELD_SELECTED_TEETH);
    }

    #[test]
    fn test_configuration_for_unknown_tooth_rejected() {
        let mut body = payload();
        body["toothConfigurations"]["tooth_99_9"] = json!({});
        assert_eq!(
            field_of(OrderValidator::new().validate(&body)),
            FIELD_TOOTH_CONFIGURATIONS
        );
    }

    #[test]
    fn test_configuration_values_checked() {
        assert!(validate_tooth_configuration(&json!({})).unwrap().is_empty());
        assert!(validate_tooth_configuration(&json!({ "material": "ouro" })).is_err());
        assert!(validate_tooth_configuration(&json!({ "color": "C4" })).is_err());
        assert!(validate_tooth_configuration(&json!({ "articulatorMM": -1.0 })).is_err());
        assert!(validate_tooth_configuration(&json!({ "articulatorMM": "3" })).is_err());
        assert!(validate_tooth_configuration(&json!({ "extra": true })).is_err());
        assert!(validate_tooth_configuration(&json!("zirconia")).is_err());

        let config = validate_tooth_configuration(&json!({
            "articulator": true,
            "articulatorMM": 0.0
        }))
        .unwrap();
        assert_eq!(config.articulator_mm, Some(0.0));
    }

    #[test]
    fn test_optional_strings_normalized() {
        let mut body = payload();
        body["patientId"] = json!("  ");
        body["smilePhotoPath"] = json!("/uploads/smile-photos/1.png");
        let order = OrderValidator::new().validate(&body).unwrap();
        assert_eq!(order.patient_id, None);
        assert_eq!(order.smile_photo_path.as_deref(), Some("/uploads/smile-photos/1.png"));

        body["observations"] = json!(42);
        assert_eq!(field_of(OrderValidator::new().validate(&body)), FIELD_OBSERVATIONS);
    }

    #[test]
    fn test_check_typed_request() {
        let validator = OrderValidator::new();
        let mut order = validator.validate(&payload()).unwrap();
        assert!(validator.check(&order).is_ok());

        order.tooth_configurations.insert("ghost".to_string(), ToothConfiguration::default());
        assert!(validator.check(&order).is_err());

        order.tooth_configurations.clear();
        order.selected_teeth.clear();
        assert!(validator.check(&order).is_err());
    }
}
