//! PDF 输出

use dental_core::{DentalError, Result};
use printpdf::{BuiltinFont, Mm, PdfDocument};

use crate::layout::{RenderedDocument, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};

const LAYER_NAME: &str = "Conteúdo";

/// 把排版结果写成 A4 PDF，正文使用 Helvetica 内置字体
pub fn to_pdf_bytes(document: &RenderedDocument) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        document.title.as_str(),
        Mm(PAGE_WIDTH_MM as f32),
        Mm(PAGE_HEIGHT_MM as f32),
        LAYER_NAME,
    );

    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| DentalError::Render(format!("Failed to load font: {}", e)))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| DentalError::Render(format!("Failed to load font: {}", e)))?;

    for (index, page) in document.pages.iter().enumerate() {
        let (page_index, layer_index) = if index == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM as f32), Mm(PAGE_HEIGHT_MM as f32), LAYER_NAME)
        };
        let layer = doc.get_page(page_index).get_layer(layer_index);

        for line in &page.lines {
            let font = if line.bold { &bold } else { &regular };
            // PDF 坐标原点在左下角
            layer.use_text(
                line.text.clone(),
                line.font_size as f32,
                Mm(line.left_edge_mm().max(0.0) as f32),
                Mm((PAGE_HEIGHT_MM - line.y_mm) as f32),
                font,
            );
        }
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| DentalError::Render(format!("Failed to write PDF: {}", e)))?;

    tracing::debug!(
        "Rendered PDF with {} page(s), {} bytes",
        document.page_count(),
        bytes.len()
    );
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{DocumentInput, DocumentRenderer};
    use chrono::Utc;
    use dental_core::{NewDentalOrder, ToothReference};
    use std::collections::BTreeMap;

    #[test]
    fn test_pdf_output() {
        let draft = NewDentalOrder {
            patient_name: "Maria Silva".to_string(),
            patient_id: None,
            selected_teeth: vec![ToothReference {
                number: "11".to_string(),
                name: "11 - Incisivo Central".to_string(),
                id: "tooth_11_1".to_string(),
            }],
            tooth_configurations: BTreeMap::new(),
            observations: Some("Cor conforme foto".to_string()),
            smile_photo_path: None,
            scanner_file_path: None,
        };
        let doc = DocumentRenderer::new()
            .render(&DocumentInput::from_draft(&draft, Utc::now().naive_local()));

        let bytes = to_pdf_bytes(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
