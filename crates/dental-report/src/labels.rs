//! 枚举值的葡萄牙语显示标签
//!
//! 数据模型只保存枚举值，文档上的文字全部在这里映射。

use dental_core::{
    FixationType, ImplantType, Material, OrderStatus, ToothConfiguration, ToothShape,
    WorkCategory, WorkType,
};

pub fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Pendente",
        OrderStatus::InProgress => "Em Andamento",
        OrderStatus::Completed => "Concluído",
        OrderStatus::Cancelled => "Cancelado",
    }
}

pub fn work_type_label(work_type: WorkType) -> &'static str {
    match work_type {
        WorkType::ComProva => "Com prova",
        WorkType::SemProva => "Sem prova",
    }
}

pub fn material_label(material: Material) -> &'static str {
    match material {
        Material::Zirconia => "Zircônia",
        Material::Pmma => "PMMA",
        Material::Dissilicato => "Dissilicato de Lítio",
    }
}

pub fn work_category_label(category: WorkCategory) -> &'static str {
    match category {
        WorkCategory::Faceta => "Faceta",
        WorkCategory::Onlay => "Onlay",
        WorkCategory::SobImplante => "Sob Implante",
        WorkCategory::SobDente => "Sob dente",
        WorkCategory::PlacaMio => "Placa mio",
    }
}

pub fn implant_type_label(implant: ImplantType) -> &'static str {
    match implant {
        ImplantType::PilarGt => "Pilar GT",
        ImplantType::MunhaoUniversal33x6 => "Munhão Universal 3.3x6",
        ImplantType::MunhaoUniversal33x4 => "Munhão Universal 3.3x4",
        ImplantType::He41 => "HE 4.1",
        ImplantType::MiniPilarSirona => "Mini pilar Sirona",
    }
}

pub fn fixation_label(fixation: FixationType) -> &'static str {
    match fixation {
        FixationType::Unitaria => "Unitária",
        FixationType::Protocolo => "Protocolo",
    }
}

pub fn shape_label(shape: ToothShape) -> &'static str {
    match shape {
        ToothShape::Redondo => "Redondo",
        ToothShape::Quadrado => "Quadrado",
        ToothShape::Pontudo => "Pontudo",
    }
}

/// 毫米值去掉多余的小数位，例如 2.0 -> "2"，2.5 -> "2.5"
pub fn format_mm(value: f64) -> String {
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{}mm", text)
}

/// 单颗牙配置的要点行（不含前缀符号），按表单顺序排列，未设置的字段不输出
pub fn configuration_lines(config: &ToothConfiguration) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(work_type) = config.work_type {
        lines.push(format!("Tipo de Trabalho: {}", work_type_label(work_type)));
    }
    if let Some(material) = config.material {
        lines.push(format!("Material: {}", material_label(material)));
    }
    if let Some(color) = config.color {
        lines.push(format!("Cor: {}", color.as_str()));
    }
    if let Some(category) = config.work_category {
        lines.push(format!("Categoria: {}", work_category_label(category)));
    }

    // 种植体字段只在 "Sob Implante" 下输出
    if config.implant_fields_relevant() {
        if let Some(implant) = config.implant_type {
            lines.push(format!("Tipo de Implante: {}", implant_type_label(implant)));
        }
        if let Some(fixation) = config.fixation_type {
            lines.push(format!("Tipo de Fixação: {}", fixation_label(fixation)));
        }
    }

    if config.is_fixed {
        match config.connected_teeth.as_deref().map(str::trim) {
            Some(teeth) if !teeth.is_empty() => {
                lines.push(format!("Fixo: Sim (conectado a {})", teeth))
            }
            _ => lines.push("Fixo: Sim".to_string()),
        }
    }
    if config.mirror_tooth {
        lines.push("Espelhar Dente: Sim".to_string());
    }
    if config.standard_library {
        lines.push("Biblioteca Padrão: Sim".to_string());
    }
    if let Some(shape) = config.tooth_shape {
        lines.push(format!("Formato do Dente: {}", shape_label(shape)));
    }
    if config.articulator {
        match config.articulator_mm {
            Some(mm) => lines.push(format!("Articulador: Sim ({})", format_mm(mm))),
            None => lines.push("Articulador: Sim".to_string()),
        }
    }

    lines
}
