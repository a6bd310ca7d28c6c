//! 恒牙目录（FDI 编号）

use chrono::Utc;
use serde::Serialize;

use crate::models::ToothReference;

/// 口腔象限
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Quadrant {
    UpperRight,
    UpperLeft,
    LowerLeft,
    LowerRight,
}

impl Quadrant {
    pub fn label(&self) -> &'static str {
        match self {
            Quadrant::UpperRight => "Quadrante Superior Direito",
            Quadrant::UpperLeft => "Quadrante Superior Esquerdo",
            Quadrant::LowerLeft => "Quadrante Inferior Esquerdo",
            Quadrant::LowerRight => "Quadrante Inferior Direito",
        }
    }
}

/// 目录中的一颗牙
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToothInfo {
    pub number: &'static str,
    pub label: &'static str,
    pub quadrant: Quadrant,
}

const fn tooth(number: &'static str, label: &'static str, quadrant: Quadrant) -> ToothInfo {
    ToothInfo {
        number,
        label,
        quadrant,
    }
}

pub const PERMANENT_TEETH: [ToothInfo; 32] = [
    tooth("11", "11 - Incisivo Central", Quadrant::UpperRight),
    tooth("12", "12 - Incisivo Lateral", Quadrant::UpperRight),
    tooth("13", "13 - Canino", Quadrant::UpperRight),
    tooth("14", "14 - 1º Pré-Molar", Quadrant::UpperRight),
    tooth("15", "15 - 2º Pré-Molar", Quadrant::UpperRight),
    tooth("16", "16 - 1º Molar", Quadrant::UpperRight),
    tooth("17", "17 - 2º Molar", Quadrant::UpperRight),
    tooth("18", "18 - 3º Molar (Siso)", Quadrant::UpperRight),
    tooth("21", "21 - Incisivo Central", Quadrant::UpperLeft),
    tooth("22", "22 - Incisivo Lateral", Quadrant::UpperLeft),
    tooth("23", "23 - Canino", Quadrant::UpperLeft),
    tooth("24", "24 - 1º Pré-Molar", Quadrant::UpperLeft),
    tooth("25", "25 - 2º Pré-Molar", Quadrant::UpperLeft),
    tooth("26", "26 - 1º Molar", Quadrant::UpperLeft),
    tooth("27", "27 - 2º Molar", Quadrant::UpperLeft),
    tooth("28", "28 - 3º Molar (Siso)", Quadrant::UpperLeft),
    tooth("31", "31 - Incisivo Central", Quadrant::LowerLeft),
    tooth("32", "32 - Incisivo Lateral", Quadrant::LowerLeft),
    tooth("33", "33 - Canino", Quadrant::LowerLeft),
    tooth("34", "34 - 1º Pré-Molar", Quadrant::LowerLeft),
    tooth("35", "35 - 2º Pré-Molar", Quadrant::LowerLeft),
    tooth("36", "36 - 1º Molar", Quadrant::LowerLeft),
    tooth("37", "37 - 2º Molar", Quadrant::LowerLeft),
    tooth("38", "38 - 3º Molar (Siso)", Quadrant::LowerLeft),
    tooth("41", "41 - Incisivo Central", Quadrant::LowerRight),
    tooth("42", "42 - Incisivo Lateral", Quadrant::LowerRight),
    tooth("43", "43 - Canino", Quadrant::LowerRight),
    tooth("44", "44 - 1º Pré-Molar", Quadrant::LowerRight),
    tooth("45", "45 - 2º Pré-Molar", Quadrant::LowerRight),
    tooth("46", "46 - 1º Molar", Quadrant::LowerRight),
    tooth("47", "47 - 2º Molar", Quadrant::LowerRight),
    tooth("48", "48 - 3º Molar (Siso)", Quadrant::LowerRight),
];

/// 按编号查找恒牙
pub fn find_tooth(number: &str) -> Option<&'static ToothInfo> {
    PERMANENT_TEETH.iter().find(|tooth| tooth.number == number)
}

/// 检查是否为两位 FDI 编号（象限 1-8，牙位 1-8，含乳牙）
pub fn is_fdi_code(number: &str) -> bool {
    let bytes = number.as_bytes();
    bytes.len() == 2
        && (b'1'..=b'8').contains(&bytes[0])
        && (b'1'..=b'8').contains(&bytes[1])
}

impl ToothReference {
    /// 用目录标签和 `tooth_<编号>_<毫秒时间戳>` 形式的标识创建牙位
    pub fn for_number(number: &str) -> Option<ToothReference> {
        let info = find_tooth(number)?;
        Some(ToothReference {
            number: info.number.to_string(),
            name: info.label.to_string(),
            id: format!("tooth_{}_{}", info.number, Utc::now().timestamp_millis()),
        })
    }
}
