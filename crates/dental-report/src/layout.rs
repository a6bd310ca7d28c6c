//! 订单文档排版
//!
//! 把订单排成 A4 页面上的文字行。排版结果与输出格式无关，
//! PDF 和纯文本都从同一份 [`RenderedDocument`] 生成。

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use dental_core::{DentalOrder, NewDentalOrder, OrderStatus, ToothConfiguration, ToothReference};
use serde::Serialize;

use crate::labels::{configuration_lines, status_label};

pub const PAGE_WIDTH_MM: f64 = 210.0;
pub const PAGE_HEIGHT_MM: f64 = 297.0;
pub const MARGIN_MM: f64 = 20.0;
/// 牙位配置块开始前允许的最大纵坐标
pub const TOOTH_BLOCK_LIMIT_MM: f64 = 250.0;
/// 备注段开始前允许的最大纵坐标
pub const OBSERVATIONS_LIMIT_MM: f64 = 200.0;
/// 正文不得越过的纵坐标，下面留给页脚
pub const CONTENT_BOTTOM_MM: f64 = 277.0;

pub const DOCUMENT_TITLE: &str = "LABORATÓRIO ODONTOLÓGICO";
pub const DOCUMENT_SUBTITLE: &str = "Ordem de Serviço Odontológica";
pub const FOOTER_SYSTEM_LINE: &str = "Sistema de Ordem de Serviço Odontológica";
pub const SECTION_PATIENT: &str = "INFORMAÇÕES DO PACIENTE";
pub const SECTION_TEETH: &str = "DENTES SELECIONADOS";
pub const SECTION_CONFIGURATIONS: &str = "CONFIGURAÇÕES DOS DENTES";
pub const SECTION_OBSERVATIONS: &str = "OBSERVAÇÕES";
pub const NAME_PREFIX: &str = "Nome: ";
pub const ID_PREFIX: &str = "ID: ";
const PAGE_FOOTER_PREFIX: &str = "Página ";

const BULLET: &str = "• ";
/// 牙位标题和配置行的续行缩进
const CONTINUATION_INDENT: &str = "  ";
const PT_TO_MM: f64 = 0.3528;
/// Helvetica 平均字宽约为字号的一半
const AVG_CHAR_WIDTH_EM: f64 = 0.5;

/// 文字对齐方式，x 坐标为对齐点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// 页面上的一行文字，坐标单位为毫米，y 从页面顶部量起
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextLine {
    pub text: String,
    pub x_mm: f64,
    pub y_mm: f64,
    pub font_size: f64,
    pub bold: bool,
    pub align: Align,
}

impl TextLine {
    /// 按平均字宽估算的左边界
    pub fn left_edge_mm(&self) -> f64 {
        let width = estimated_width_mm(&self.text, self.font_size);
        match self.align {
            Align::Left => self.x_mm,
            Align::Center => self.x_mm - width / 2.0,
            Align::Right => self.x_mm - width,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    pub lines: Vec<TextLine>,
}

/// 排版完成的文档
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedDocument {
    pub title: String,
    pub pages: Vec<Page>,
}

impl RenderedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 纯文本形式：每行一条，页之间用换页符分隔
    pub fn to_plain_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| {
                page.lines
                    .iter()
                    .map(|line| line.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\u{000C}\n")
    }
}

/// 渲染输入：已保存的订单，或者表单中尚未保存的草稿
#[derive(Debug, Clone)]
pub struct DocumentInput<'a> {
    pub order_number: Option<&'a str>,
    pub status: Option<OrderStatus>,
    pub patient_name: &'a str,
    pub patient_id: Option<&'a str>,
    pub selected_teeth: &'a [ToothReference],
    pub tooth_configurations: &'a BTreeMap<String, ToothConfiguration>,
    pub observations: Option<&'a str>,
    /// 打印在文档上的生成时间（本地时间）
    pub generated_at: NaiveDateTime,
}

impl<'a> DocumentInput<'a> {
    pub fn from_order(order: &'a DentalOrder, generated_at: NaiveDateTime) -> Self {
        Self {
            order_number: Some(&order.order_number),
            status: Some(order.status),
            patient_name: &order.patient_name,
            patient_id: order.patient_id.as_deref(),
            selected_teeth: &order.selected_teeth,
            tooth_configurations: &order.tooth_configurations,
            observations: order.observations.as_deref(),
            generated_at,
        }
    }

    pub fn from_draft(draft: &'a NewDentalOrder, generated_at: NaiveDateTime) -> Self {
        Self {
            order_number: None,
            status: None,
            patient_name: &draft.patient_name,
            patient_id: draft.patient_id.as_deref(),
            selected_teeth: &draft.selected_teeth,
            tooth_configurations: &draft.tooth_configurations,
            observations: draft.observations.as_deref(),
            generated_at,
        }
    }
}

/// 逐页写入文字，记录当前纵坐标
struct PageWriter {
    pages: Vec<Page>,
    y: f64,
}

impl PageWriter {
    fn new() -> Self {
        Self {
            pages: vec![Page::default()],
            y: MARGIN_MM,
        }
    }

    fn new_page(&mut self) {
        self.pages.push(Page::default());
        self.y = MARGIN_MM;
    }

    fn break_if_below(&mut self, limit: f64) {
        if self.y > limit {
            self.new_page();
        }
    }

    fn push(&mut self, text: impl Into<String>, x_mm: f64, font_size: f64, bold: bool, align: Align) {
        let line = TextLine {
            text: text.into(),
            x_mm,
            y_mm: self.y,
            font_size,
            bold,
            align,
        };
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(line);
        }
    }

    fn advance(&mut self, mm: f64) {
        self.y += mm;
    }

    /// 正文行：越过页面底线时换页
    fn body_line(&mut self, text: impl Into<String>, x_mm: f64, font_size: f64, bold: bool, step: f64) {
        if self.y > CONTENT_BOTTOM_MM {
            self.new_page();
        }
        self.push(text, x_mm, font_size, bold, Align::Left);
        self.advance(step);
    }

    /// 自动换行的段落，返回后 y 位于段落末行之后
    fn wrapped(&mut self, text: &str, x_mm: f64, max_width_mm: f64, font_size: f64) {
        let step = font_size * PT_TO_MM;
        let text: String = text
            .chars()
            .map(|c| if c.is_control() && c != '\n' { ' ' } else { c })
            .collect();
        for line in wrap_text(&text, max_chars(max_width_mm, font_size)) {
            self.body_line(line, x_mm, font_size, false, step);
        }
    }

    /// 单行内容按词换行，续行带缩进
    fn hanging(&mut self, text: &str, x_mm: f64, max_width_mm: f64, font_size: f64, bold: bool, step: f64) {
        let limit = max_chars(max_width_mm, font_size).saturating_sub(CONTINUATION_INDENT.len());
        for (index, line) in wrap_text(&single_line(text), limit).into_iter().enumerate() {
            let text = if index == 0 { line } else { format!("{}{}", CONTINUATION_INDENT, line) };
            self.body_line(text, x_mm, font_size, bold, step);
        }
    }

    /// `标签: 值` 形式的患者字段，续行与值对齐；各行去掉标签后按顺序拼接即为原值
    fn labeled(&mut self, label: &str, value: &str, max_width_mm: f64, font_size: f64, step: f64) {
        let label_len = label.chars().count();
        let limit = max_chars(max_width_mm, font_size).saturating_sub(label_len);
        let value_x = MARGIN_MM + estimated_width_mm(label, font_size);
        for (index, segment) in split_field(&single_line(value), limit).into_iter().enumerate() {
            if index == 0 {
                self.body_line(format!("{}{}", label, segment), MARGIN_MM, font_size, false, step);
            } else {
                self.body_line(segment, value_x, font_size, false, step);
            }
        }
    }
}

/// 订单文档渲染器
#[derive(Debug, Clone, Default)]
pub struct DocumentRenderer;

impl DocumentRenderer {
    pub fn new() -> Self {
        Self
    }

    /// 按固定顺序排版：标题、订单号/状态/日期、患者信息、牙位汇总、逐牙配置、备注
    pub fn render(&self, input: &DocumentInput<'_>) -> RenderedDocument {
        let center = PAGE_WIDTH_MM / 2.0;
        let text_width = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
        let mut w = PageWriter::new();

        w.push(DOCUMENT_TITLE, center, 18.0, true, Align::Center);
        w.advance(10.0);
        w.push(DOCUMENT_SUBTITLE, center, 14.0, false, Align::Center);
        w.advance(10.0);

        if let Some(order_number) = input.order_number {
            w.push(format!("Pedido: {}", order_number), center, 12.0, true, Align::Center);
            w.advance(8.0);
        }
        if let Some(status) = input.status {
            w.push(format!("Status: {}", status_label(status)), center, 12.0, false, Align::Center);
            w.advance(8.0);
        }

        w.push(
            format!("Data: {}", input.generated_at.format("%d/%m/%Y - %H:%M:%S")),
            PAGE_WIDTH_MM - MARGIN_MM,
            10.0,
            false,
            Align::Right,
        );
        w.advance(15.0);

        // 患者信息
        w.push(SECTION_PATIENT, MARGIN_MM, 14.0, true, Align::Left);
        w.advance(8.0);
        w.labeled(NAME_PREFIX, input.patient_name, text_width, 12.0, 6.0);
        if let Some(patient_id) = input.patient_id.map(str::trim).filter(|id| !id.is_empty()) {
            w.labeled(ID_PREFIX, patient_id, text_width, 12.0, 6.0);
        }
        w.advance(9.0);

        if !input.selected_teeth.is_empty() {
            w.push(SECTION_TEETH, MARGIN_MM, 14.0, true, Align::Left);
            w.advance(8.0);
            let numbers: Vec<&str> = input.selected_teeth.iter().map(|t| t.number.as_str()).collect();
            w.wrapped(&format!("Dentes: {}", numbers.join(", ")), MARGIN_MM, text_width, 12.0);
            w.advance(10.0);

            w.break_if_below(TOOTH_BLOCK_LIMIT_MM);
            w.push(SECTION_CONFIGURATIONS, MARGIN_MM, 14.0, true, Align::Left);
            w.advance(10.0);

            for tooth in input.selected_teeth {
                w.break_if_below(TOOTH_BLOCK_LIMIT_MM);
                w.hanging(
                    &format!("Dente {} ({})", tooth.number, tooth.name),
                    MARGIN_MM,
                    text_width,
                    12.0,
                    true,
                    6.0,
                );
                if let Some(config) = input.tooth_configurations.get(&tooth.id) {
                    for line in configuration_lines(config) {
                        w.hanging(
                            &format!("{}{}", BULLET, line),
                            MARGIN_MM + 5.0,
                            text_width - 5.0,
                            12.0,
                            false,
                            5.0,
                        );
                    }
                }
                w.advance(5.0);
            }
        }

        if let Some(observations) = input.observations.map(str::trim).filter(|o| !o.is_empty()) {
            w.break_if_below(OBSERVATIONS_LIMIT_MM);
            w.push(SECTION_OBSERVATIONS, MARGIN_MM, 14.0, true, Align::Left);
            w.advance(8.0);
            w.wrapped(observations, MARGIN_MM, text_width, 12.0);
        }

        let mut pages = w.pages;
        add_footers(&mut pages);

        RenderedDocument {
            title: DOCUMENT_SUBTITLE.to_string(),
            pages,
        }
    }
}

/// 页脚在全部页面排完之后统一补上，此时总页数已知
fn add_footers(pages: &mut [Page]) {
    let total = pages.len();
    let center = PAGE_WIDTH_MM / 2.0;
    for (index, page) in pages.iter_mut().enumerate() {
        page.lines.push(TextLine {
            text: format!("Página {} de {}", index + 1, total),
            x_mm: center,
            y_mm: PAGE_HEIGHT_MM - 10.0,
            font_size: 8.0,
            bold: false,
            align: Align::Center,
        });
        page.lines.push(TextLine {
            text: FOOTER_SYSTEM_LINE.to_string(),
            x_mm: center,
            y_mm: PAGE_HEIGHT_MM - 5.0,
            font_size: 8.0,
            bold: false,
            align: Align::Center,
        });
    }
}

pub fn estimated_width_mm(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * font_size * PT_TO_MM * AVG_CHAR_WIDTH_EM
}

fn max_chars(width_mm: f64, font_size: f64) -> usize {
    ((width_mm / (font_size * PT_TO_MM * AVG_CHAR_WIDTH_EM)).floor() as usize).max(1)
}

/// 控制字符（含换行）替换为空格
fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// 患者字段续行之后可能出现的行；续行不能以这些内容开头
pub(crate) fn is_field_boundary(line: &str) -> bool {
    line.starts_with('\u{000C}')
        || [
            ID_PREFIX,
            PAGE_FOOTER_PREFIX,
            FOOTER_SYSTEM_LINE,
            SECTION_TEETH,
            SECTION_CONFIGURATIONS,
            SECTION_OBSERVATIONS,
        ]
        .iter()
        .any(|marker| line.starts_with(marker))
}

/// 把单行字段切成每段不超过 `max` 个字符的若干段。
/// 各段拼接后与原文完全一致；优先在空白之后断开。
fn split_field(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let limit = max.max(1);
    let mut segments = Vec::new();
    let mut start = 0;

    while chars.len() - start > limit {
        let window = &chars[start..start + limit];
        let mut end = match window.iter().rposition(|c| c.is_whitespace()) {
            Some(pos) if pos > 0 => start + pos + 1,
            _ => start + limit,
        };
        while end > start + 1 {
            let next: String = chars[end..].iter().take(64).collect();
            if !is_field_boundary(&next) {
                break;
            }
            end -= 1;
        }
        segments.push(chars[start..end].iter().collect());
        start = end;
    }
    segments.push(chars[start..].iter().collect());
    segments
}

/// 按词换行；保留原文中的换行，超长单词按字符切开
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        if current_len > 0 || paragraph.trim().is_empty() {
            lines.push(current);
        }
    }

    lines
}
