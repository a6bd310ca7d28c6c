//! 从文档文字中读回结构化字段
//!
//! 只恢复患者姓名、订单号和牙位编号，用于核对文档内容与订单一致。

use std::collections::BTreeSet;

use crate::layout::{
    is_field_boundary, RenderedDocument, ID_PREFIX, NAME_PREFIX, SECTION_CONFIGURATIONS,
    SECTION_OBSERVATIONS, SECTION_PATIENT, SECTION_TEETH,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSummary {
    pub order_number: Option<String>,
    pub patient_name: Option<String>,
    pub patient_id: Option<String>,
    pub tooth_numbers: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Patient,
    Teeth,
    Configurations,
    Observations,
}

/// 可能跨行的患者字段
#[derive(Debug, Clone, Copy)]
enum Field {
    Name,
    Id,
}

impl DocumentSummary {
    pub fn from_document(document: &RenderedDocument) -> Self {
        Self::parse(&document.to_plain_text())
    }

    /// 解析纯文本形式的文档
    ///
    /// 姓名和 ID 过长时折成多行，续行原样拼回。观察事项之后的文字不再解析。
    pub fn parse(text: &str) -> Self {
        let mut summary = DocumentSummary::default();
        let mut section = Section::Header;
        let mut continuing: Option<Field> = None;

        for raw in text.lines() {
            if let Some(field) = continuing {
                if !raw.is_empty() && !is_field_boundary(raw) {
                    let value = match field {
                        Field::Name => &mut summary.patient_name,
                        Field::Id => &mut summary.patient_id,
                    };
                    if let Some(value) = value.as_mut() {
                        value.push_str(raw);
                    }
                    continue;
                }
                continuing = None;
            }

            if section != Section::Observations {
                let next = match raw {
                    SECTION_PATIENT => Some(Section::Patient),
                    SECTION_TEETH => Some(Section::Teeth),
                    SECTION_CONFIGURATIONS => Some(Section::Configurations),
                    SECTION_OBSERVATIONS => Some(Section::Observations),
                    _ => None,
                };
                if let Some(next) = next {
                    section = next;
                    continue;
                }
            }

            match section {
                Section::Header => {
                    if let Some(number) = raw.trim().strip_prefix("Pedido: ") {
                        summary.order_number.get_or_insert_with(|| number.trim().to_string());
                    }
                }
                Section::Patient => {
                    if summary.patient_name.is_none() {
                        if let Some(name) = raw.strip_prefix(NAME_PREFIX) {
                            summary.patient_name = Some(name.to_string());
                            continuing = Some(Field::Name);
                        }
                    } else if summary.patient_id.is_none() {
                        if let Some(id) = raw.strip_prefix(ID_PREFIX) {
                            summary.patient_id = Some(id.to_string());
                            continuing = Some(Field::Id);
                        }
                    }
                }
                Section::Configurations => {
                    // 每颗牙的配置块以 "Dente <编号> (<名称>)" 开头，续行带缩进
                    if let Some(rest) = raw.strip_prefix("Dente ") {
                        if let Some((number, _)) = rest.split_once(" (") {
                            summary.tooth_numbers.insert(number.to_string());
                        }
                    }
                }
                Section::Teeth | Section::Observations => {}
            }
        }

        summary
    }
}
